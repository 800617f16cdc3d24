//! # Gas Meter
//!
//! Per-frame gas accounting. `consume` is the only debit path.

use crate::errors::VmError;

/// Tracks gas for one frame.
///
/// ## Invariants
/// - `remaining` never goes negative: a debit larger than `remaining` is
///   rejected without touching any field
/// - `refund` only accumulates storage-clear refunds; it is applied once at
///   the end of the transaction, capped
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GasMeter {
    remaining: u64,
    used: u64,
    refund: u64,
}

impl GasMeter {
    /// Creates a meter with `limit` gas available.
    #[must_use]
    pub const fn new(limit: u64) -> Self {
        Self {
            remaining: limit,
            used: 0,
            refund: 0,
        }
    }

    /// Returns remaining gas.
    #[must_use]
    pub const fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Returns gas used so far.
    #[must_use]
    pub const fn used(&self) -> u64 {
        self.used
    }

    /// Returns the accumulated storage refund counter.
    #[must_use]
    pub const fn refund_counter(&self) -> u64 {
        self.refund
    }

    /// Debits `amount`.
    ///
    /// # Errors
    ///
    /// Returns `OutOfGas` if `amount > remaining`; the meter is unchanged.
    pub fn consume(&mut self, amount: u64) -> Result<(), VmError> {
        if amount > self.remaining {
            return Err(VmError::OutOfGas);
        }
        self.remaining -= amount;
        self.used = self.used.saturating_add(amount);
        Ok(())
    }

    /// Credits `amount` back. Exact inverse of `consume(amount)`.
    ///
    /// No cap is applied here; callers bound refunds per protocol rules.
    pub fn refund(&mut self, amount: u64) {
        self.remaining = self.remaining.saturating_add(amount);
        self.used = self.used.saturating_sub(amount);
    }

    /// Adds to the storage refund counter.
    pub fn add_refund(&mut self, amount: u64) {
        self.refund = self.refund.saturating_add(amount);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_consume_and_refund() {
        let mut gas = GasMeter::new(1000);
        assert_eq!(gas.remaining(), 1000);

        gas.consume(500).unwrap();
        assert_eq!(gas.used(), 500);
        assert_eq!(gas.remaining(), 500);

        assert_eq!(gas.consume(600), Err(VmError::OutOfGas));
        assert_eq!(gas.used(), 500); // Unchanged
        assert_eq!(gas.remaining(), 500);

        gas.refund(200);
        assert_eq!(gas.remaining(), 700);
        assert_eq!(gas.used(), 300);
    }

    #[test]
    fn test_exhaust_exactly() {
        let mut gas = GasMeter::new(21_000);
        gas.consume(21_000).unwrap();
        assert_eq!(gas.remaining(), 0);
        assert_eq!(gas.consume(1), Err(VmError::OutOfGas));
        assert_eq!(gas.remaining(), 0);
    }

    #[test]
    fn test_refund_counter() {
        let mut gas = GasMeter::new(10);
        gas.add_refund(4800);
        gas.add_refund(4800);
        assert_eq!(gas.refund_counter(), 9600);
        gas.add_refund(u64::MAX);
        assert_eq!(gas.refund_counter(), u64::MAX);
    }

    proptest! {
        #[test]
        fn prop_consume_within_budget(
            limit in 0u64..1_000_000,
            pre in 0u64..1_000_000,
            amount in 0u64..1_000_000,
        ) {
            let mut gas = GasMeter::new(limit);
            let _ = gas.consume(pre.min(limit));
            let before = gas;
            match gas.consume(amount) {
                Ok(()) => {
                    prop_assert!(amount <= before.remaining());
                    prop_assert_eq!(gas.remaining(), before.remaining() - amount);
                    prop_assert_eq!(gas.used(), before.used() + amount);
                }
                Err(err) => {
                    prop_assert_eq!(err, VmError::OutOfGas);
                    prop_assert!(amount > before.remaining());
                    prop_assert_eq!(gas, before);
                }
            }
        }

        #[test]
        fn prop_refund_inverts_consume(limit in 0u64..1_000_000, amount in 0u64..1_000_000) {
            let mut gas = GasMeter::new(limit);
            let before = gas;
            if gas.consume(amount).is_ok() {
                gas.refund(amount);
                prop_assert_eq!(gas, before);
            }
        }
    }
}
