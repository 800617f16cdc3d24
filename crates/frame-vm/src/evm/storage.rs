//! # Storage
//!
//! Persistent key/value slots of one contract account.
//! Absent slots read as zero and writing zero clears a slot.

use crate::domain::value_objects::{StorageKey, Word};
use crate::evm::{Checkpoint, Journaled};
use std::collections::HashMap;

/// Contract storage with an undo journal.
///
/// While at least one checkpoint is open, every write records the slot's
/// previous value so the write can be undone.
#[derive(Clone, Debug, Default)]
pub struct Storage {
    slots: HashMap<StorageKey, Word>,
    journal: Vec<(StorageKey, Option<Word>)>,
    marks: Vec<usize>,
}

impl Storage {
    /// Creates empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates storage pre-populated with `slots` (zero values are skipped).
    #[must_use]
    pub fn from_slots(slots: HashMap<StorageKey, Word>) -> Self {
        Self {
            slots: slots.into_iter().filter(|(_, v)| !v.is_zero()).collect(),
            ..Self::default()
        }
    }

    /// Reads a slot.
    #[must_use]
    pub fn load(&self, key: &StorageKey) -> Word {
        self.slots.get(key).copied().unwrap_or_default()
    }

    /// Writes a slot and returns its previous value.
    pub fn store(&mut self, key: StorageKey, value: Word) -> Word {
        let previous = if value.is_zero() {
            self.slots.remove(&key)
        } else {
            self.slots.insert(key, value)
        };
        if !self.marks.is_empty() {
            self.journal.push((key, previous));
        }
        previous.unwrap_or_default()
    }

    /// Number of non-zero slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if no slot is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterates over non-zero slots.
    pub fn iter(&self) -> impl Iterator<Item = (&StorageKey, &Word)> {
        self.slots.iter()
    }

    /// Copies the current slots, without journal state.
    #[must_use]
    pub fn snapshot(&self) -> HashMap<StorageKey, Word> {
        self.slots.clone()
    }

    /// Replaces this storage's slots with `other`'s committed view.
    ///
    /// `other` was seeded from this storage, so its slot set is the full new
    /// state; writes go through [`Storage::store`] and are journaled.
    pub fn merge_from(&mut self, other: &Storage) {
        let stale: Vec<StorageKey> = self
            .slots
            .keys()
            .filter(|key| !other.slots.contains_key(key))
            .copied()
            .collect();
        for key in stale {
            self.store(key, Word::zero());
        }
        for (key, value) in &other.slots {
            if self.slots.get(key) != Some(value) {
                self.store(*key, *value);
            }
        }
    }
}

impl Journaled for Storage {
    fn checkpoint(&mut self) -> Checkpoint {
        self.marks.push(self.journal.len());
        Checkpoint(self.marks.len() - 1)
    }

    fn revert_to(&mut self, checkpoint: Checkpoint) {
        let Some(&mark) = self.marks.get(checkpoint.0) else {
            return;
        };
        while self.journal.len() > mark {
            if let Some((key, previous)) = self.journal.pop() {
                match previous {
                    Some(value) => self.slots.insert(key, value),
                    None => self.slots.remove(&key),
                };
            }
        }
        self.marks.truncate(checkpoint.0);
    }

    fn commit(&mut self, checkpoint: Checkpoint) {
        self.marks.truncate(checkpoint.0);
        if self.marks.is_empty() {
            self.journal.clear();
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u64) -> StorageKey {
        StorageKey::from(n)
    }

    #[test]
    fn test_absent_slot_reads_zero() {
        let storage = Storage::new();
        assert_eq!(storage.load(&key(1)), Word::zero());
    }

    #[test]
    fn test_store_returns_previous_and_zero_clears() {
        let mut storage = Storage::new();
        assert_eq!(storage.store(key(1), Word::from(5)), Word::zero());
        assert_eq!(storage.store(key(1), Word::from(6)), Word::from(5));
        assert_eq!(storage.len(), 1);

        storage.store(key(1), Word::zero());
        assert!(storage.is_empty());
    }

    #[test]
    fn test_revert_restores_previous_values() {
        let mut storage = Storage::new();
        storage.store(key(1), Word::from(1));

        let cp = storage.checkpoint();
        storage.store(key(1), Word::from(2));
        storage.store(key(2), Word::from(3));
        storage.store(key(1), Word::zero());
        storage.revert_to(cp);

        assert_eq!(storage.load(&key(1)), Word::from(1));
        assert_eq!(storage.load(&key(2)), Word::zero());
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_nested_checkpoints() {
        let mut storage = Storage::new();
        let outer = storage.checkpoint();
        storage.store(key(1), Word::from(1));
        let inner = storage.checkpoint();
        storage.store(key(1), Word::from(2));

        storage.revert_to(inner);
        assert_eq!(storage.load(&key(1)), Word::from(1));

        storage.commit(outer);
        assert_eq!(storage.load(&key(1)), Word::from(1));
    }

    #[test]
    fn test_writes_without_checkpoint_are_not_journaled() {
        let mut storage = Storage::new();
        storage.store(key(1), Word::from(1));
        let cp = storage.checkpoint();
        storage.revert_to(cp);
        assert_eq!(storage.load(&key(1)), Word::from(1));
    }

    #[test]
    fn test_merge_from_applies_updates_and_deletions() {
        let mut owner = Storage::new();
        owner.store(key(1), Word::from(1));
        owner.store(key(2), Word::from(2));

        let mut child = Storage::from_slots(owner.snapshot());
        child.store(key(1), Word::zero());
        child.store(key(3), Word::from(3));

        owner.merge_from(&child);
        assert_eq!(owner.load(&key(1)), Word::zero());
        assert_eq!(owner.load(&key(2)), Word::from(2));
        assert_eq!(owner.load(&key(3)), Word::from(3));
    }

    #[test]
    fn test_merge_is_journaled() {
        let mut owner = Storage::new();
        owner.store(key(1), Word::from(1));
        let cp = owner.checkpoint();

        let mut child = Storage::from_slots(owner.snapshot());
        child.store(key(1), Word::from(9));
        owner.merge_from(&child);
        assert_eq!(owner.load(&key(1)), Word::from(9));

        owner.revert_to(cp);
        assert_eq!(owner.load(&key(1)), Word::from(1));
    }
}
