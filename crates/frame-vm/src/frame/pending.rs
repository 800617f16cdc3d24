//! # Pending State
//!
//! Storage and code produced by successful descendant calls for accounts the
//! frame does not own. It folds into the parent when the frame succeeds and
//! reaches [`crate::context::WorldState`] only when the root frame succeeds.

use crate::domain::value_objects::{Address, Bytes, StorageKey, Word};
use crate::evm::{Checkpoint, Journaled};
use std::collections::HashMap;

/// Full slot view of one account.
pub type SlotMap = HashMap<StorageKey, Word>;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Accounts {
    storage: HashMap<Address, SlotMap>,
    code: HashMap<Address, Bytes>,
}

/// Uncommitted account changes of a call subtree.
#[derive(Clone, Debug, Default)]
pub struct PendingState {
    accounts: Accounts,
    snapshots: Vec<Accounts>,
}

impl PendingState {
    /// Creates an empty overlay.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest slot view of `address`, if this overlay has one.
    #[must_use]
    pub fn storage(&self, address: &Address) -> Option<&SlotMap> {
        self.accounts.storage.get(address)
    }

    /// Replaces the slot view of `address`.
    pub fn set_storage(&mut self, address: Address, slots: SlotMap) {
        self.accounts.storage.insert(address, slots);
    }

    /// Code deployed at `address` within this subtree.
    #[must_use]
    pub fn code(&self, address: &Address) -> Option<&Bytes> {
        self.accounts.code.get(address)
    }

    /// Records deployed code.
    pub fn set_code(&mut self, address: Address, code: Bytes) {
        self.accounts.code.insert(address, code);
    }

    /// Returns true if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.storage.is_empty() && self.accounts.code.is_empty()
    }

    /// Consumes the overlay, yielding storage views and deployed code.
    #[must_use]
    pub fn into_parts(self) -> (HashMap<Address, SlotMap>, HashMap<Address, Bytes>) {
        (self.accounts.storage, self.accounts.code)
    }
}

impl Journaled for PendingState {
    fn checkpoint(&mut self) -> Checkpoint {
        self.snapshots.push(self.accounts.clone());
        Checkpoint(self.snapshots.len() - 1)
    }

    fn revert_to(&mut self, checkpoint: Checkpoint) {
        if let Some(snapshot) = self.snapshots.get(checkpoint.0) {
            self.accounts = snapshot.clone();
            self.snapshots.truncate(checkpoint.0);
        }
    }

    fn commit(&mut self, checkpoint: Checkpoint) {
        self.snapshots.truncate(checkpoint.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_read() {
        let mut pending = PendingState::new();
        assert!(pending.is_empty());

        let addr = Address::from_low_u8(1);
        let mut slots = SlotMap::new();
        slots.insert(StorageKey::from(1u64), Word::from(5));
        pending.set_storage(addr, slots.clone());
        pending.set_code(addr, Bytes::from_slice(&[0x00]));

        assert_eq!(pending.storage(&addr), Some(&slots));
        assert_eq!(pending.code(&addr), Some(&Bytes::from_slice(&[0x00])));
        assert!(pending.storage(&Address::from_low_u8(2)).is_none());
    }

    #[test]
    fn test_revert_drops_later_entries() {
        let mut pending = PendingState::new();
        let cp = pending.checkpoint();
        pending.set_code(Address::from_low_u8(1), Bytes::from_slice(&[1]));
        pending.revert_to(cp);
        assert!(pending.is_empty());
    }
}
