//! # Gas Costs
//!
//! Static and dynamic gas costs for the supported instruction set.
//! Values follow the Berlin/London schedule without access lists.

use crate::evm::opcodes::Opcode;

// =============================================================================
// BASE GAS COSTS
// =============================================================================

/// Gas costs for common operations.
pub mod costs {
    /// Zero gas.
    pub const ZERO: u64 = 0;
    /// Base cost (e.g., for `CALLER`).
    pub const BASE: u64 = 2;
    /// Very low cost (e.g., for `ADD`).
    pub const VERY_LOW: u64 = 3;
    /// Low cost (e.g., for `MUL`).
    pub const LOW: u64 = 5;
    /// Mid cost.
    pub const MID: u64 = 8;
    /// High cost.
    pub const HIGH: u64 = 10;
    /// Jump destination cost.
    pub const JUMPDEST: u64 = 1;

    /// Base transaction gas.
    pub const TX_BASE: u64 = 21_000;

    /// Gas per word for memory copy.
    pub const COPY: u64 = 3;

    /// Storage read.
    pub const SLOAD: u64 = 800;
    /// SSTORE when setting zero to non-zero.
    pub const SSTORE_SET: u64 = 20_000;
    /// SSTORE on an already non-zero slot, or writing zero.
    pub const SSTORE_RESET: u64 = 2900;
    /// SSTORE refund for clearing storage.
    pub const SSTORE_CLEAR_REFUND: u64 = 4800;

    /// Call base cost (warm account access).
    pub const CALL: u64 = 100;
    /// Cost for value transfer.
    pub const CALL_VALUE: u64 = 9000;
    /// Stipend given to called contract when value > 0.
    pub const CALL_STIPEND: u64 = 2300;
    /// Internal (jump-based) call.
    pub const CALLF: u64 = 5;
    /// Internal return.
    pub const RETF: u64 = 3;

    /// CREATE opcode base cost.
    pub const CREATE: u64 = 32_000;
    /// Init code cost per word (EIP-3860).
    pub const INIT_CODE_WORD: u64 = 2;
    /// Deployed code cost per byte.
    pub const CODE_DEPOSIT_BYTE: u64 = 200;

    /// LOG base cost.
    pub const LOG: u64 = 375;
    /// LOG cost per topic.
    pub const LOG_TOPIC: u64 = 375;
    /// LOG cost per byte of data.
    pub const LOG_DATA: u64 = 8;
}

// =============================================================================
// GAS CALCULATOR
// =============================================================================

/// Static gas charged before an opcode executes.
#[must_use]
pub fn static_gas(opcode: Opcode) -> u64 {
    match opcode {
        Opcode::Stop | Opcode::Return | Opcode::Revert | Opcode::Invalid | Opcode::Unknown => {
            costs::ZERO
        }
        Opcode::Add | Opcode::Sub | Opcode::Lt | Opcode::Gt | Opcode::Eq | Opcode::IsZero => {
            costs::VERY_LOW
        }
        Opcode::Mul => costs::LOW,
        Opcode::Caller
        | Opcode::CallValue
        | Opcode::CallDataSize
        | Opcode::ReturnDataSize
        | Opcode::Pop
        | Opcode::Pc
        | Opcode::MSize
        | Opcode::Gas => costs::BASE,
        Opcode::CallDataLoad
        | Opcode::ReturnDataCopy
        | Opcode::MLoad
        | Opcode::MStore
        | Opcode::MStore8 => costs::VERY_LOW,
        Opcode::SLoad => costs::SLOAD,
        // SSTORE is fully dynamic
        Opcode::SStore => costs::ZERO,
        Opcode::Jump => costs::MID,
        Opcode::JumpI => costs::HIGH,
        Opcode::JumpDest => costs::JUMPDEST,
        Opcode::Push(0) => costs::BASE,
        Opcode::Push(_) | Opcode::Dup(_) | Opcode::Swap(_) => costs::VERY_LOW,
        Opcode::Log(_) => costs::LOG,
        Opcode::CallF => costs::CALLF,
        Opcode::RetF => costs::RETF,
        Opcode::Create => costs::CREATE,
        Opcode::Call | Opcode::StaticCall => costs::CALL,
    }
}

/// Calculate gas cost for LOG opcode (excluding the static base).
#[must_use]
pub fn log_dynamic_gas(data_size: usize, topic_count: usize) -> u64 {
    costs::LOG_TOPIC * topic_count as u64 + costs::LOG_DATA * data_size as u64
}

/// Calculate gas cost for COPY operations (RETURNDATACOPY, etc.).
#[must_use]
pub fn copy_gas_cost(size: usize) -> u64 {
    let word_size = size.div_ceil(32);
    costs::COPY * word_size as u64
}

/// Init code charge for CREATE (excluding the static base).
#[must_use]
pub fn create_dynamic_gas(init_code_size: usize) -> u64 {
    costs::INIT_CODE_WORD * init_code_size.div_ceil(32) as u64
}

/// Charge for depositing `code_size` bytes of deployed code.
#[must_use]
pub fn code_deposit_gas(code_size: usize) -> u64 {
    costs::CODE_DEPOSIT_BYTE * code_size as u64
}

/// SSTORE cost given the slot's current value and the new value.
#[must_use]
pub fn sstore_gas(current_is_zero: bool, new_is_zero: bool) -> u64 {
    if current_is_zero && !new_is_zero {
        costs::SSTORE_SET
    } else {
        costs::SSTORE_RESET
    }
}

/// Calculate gas to pass to a subcall (63/64 rule per EIP-150).
#[must_use]
pub fn calculate_call_gas(available_gas: u64, requested_gas: u64) -> u64 {
    let max_gas = available_gas - (available_gas / 64);
    requested_gas.min(max_gas)
}

// =============================================================================
// GAS REFUND
// =============================================================================

/// Calculate effective refund, capped at `gas_used / quotient` (EIP-3529).
#[must_use]
pub fn calculate_refund(gas_used: u64, refund: u64, quotient: u64) -> u64 {
    let max_refund = gas_used / quotient.max(1);
    refund.min(max_refund)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_gas() {
        assert_eq!(static_gas(Opcode::Add), costs::VERY_LOW);
        assert_eq!(static_gas(Opcode::Mul), costs::LOW);
        assert_eq!(static_gas(Opcode::Push(0)), costs::BASE);
        assert_eq!(static_gas(Opcode::Push(1)), costs::VERY_LOW);
        assert_eq!(static_gas(Opcode::Dup(1)), costs::VERY_LOW);
        assert_eq!(static_gas(Opcode::Stop), 0);
    }

    #[test]
    fn test_log_dynamic_gas() {
        assert_eq!(log_dynamic_gas(32, 0), costs::LOG_DATA * 32);
        assert_eq!(
            log_dynamic_gas(64, 2),
            costs::LOG_TOPIC * 2 + costs::LOG_DATA * 64
        );
    }

    #[test]
    fn test_copy_gas_cost() {
        assert_eq!(copy_gas_cost(0), 0);
        assert_eq!(copy_gas_cost(32), costs::COPY);
        assert_eq!(copy_gas_cost(33), costs::COPY * 2); // Rounded up
    }

    #[test]
    fn test_sstore_gas() {
        assert_eq!(sstore_gas(true, false), costs::SSTORE_SET);
        assert_eq!(sstore_gas(false, false), costs::SSTORE_RESET);
        assert_eq!(sstore_gas(false, true), costs::SSTORE_RESET);
    }

    #[test]
    fn test_calculate_call_gas() {
        // 63/64 rule
        assert_eq!(calculate_call_gas(64_000, 100_000), 63_000);
        assert_eq!(calculate_call_gas(64_000, 50_000), 50_000);
    }

    #[test]
    fn test_calculate_refund() {
        assert_eq!(calculate_refund(1000, 600, 5), 200);
        assert_eq!(calculate_refund(1000, 100, 5), 100);
        assert_eq!(calculate_refund(1000, 600, 2), 500);
    }
}
