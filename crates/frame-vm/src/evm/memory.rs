//! # Memory
//!
//! Byte-addressable scratch memory that grows on demand in 32-byte words.
//! Expansion is charged by the caller using [`memory_expansion_cost`].

use crate::errors::VmError;
use crate::evm::{Checkpoint, Journaled};

/// Default maximum memory size (16 MB).
pub const MAX_MEMORY_SIZE: usize = 16 * 1024 * 1024;

/// Word size in bytes (32 bytes = 256 bits).
pub const WORD_SIZE: usize = 32;

#[derive(Clone, Debug)]
struct Overwrite {
    offset: usize,
    previous: Vec<u8>,
}

#[derive(Clone, Copy, Debug)]
struct Mark {
    journal_len: usize,
    data_len: usize,
}

/// Frame memory.
#[derive(Clone, Debug)]
pub struct Memory {
    data: Vec<u8>,
    limit: usize,
    journal: Vec<Overwrite>,
    marks: Vec<Mark>,
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory {
    /// Creates a new empty memory with the default limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(MAX_MEMORY_SIZE)
    }

    /// Creates a new empty memory bounded to `limit` bytes.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            data: Vec::new(),
            limit,
            journal: Vec::new(),
            marks: Vec::new(),
        }
    }

    /// Returns the current memory size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if memory is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the memory size in 32-byte words.
    #[must_use]
    pub fn word_size(&self) -> usize {
        self.data.len().div_ceil(WORD_SIZE)
    }

    /// Ensures `[offset, offset + size)` is allocated.
    /// Returns the number of new words added (for gas calculation).
    /// A zero-sized region never expands.
    ///
    /// # Errors
    ///
    /// Returns `MemoryLimitExceeded` if the region ends beyond the limit.
    pub fn expand(&mut self, offset: usize, size: usize) -> Result<usize, VmError> {
        if size == 0 {
            return Ok(0);
        }
        let end = offset.checked_add(size).ok_or(VmError::MemoryLimitExceeded {
            requested: usize::MAX,
            max: self.limit,
        })?;
        if end <= self.data.len() {
            return Ok(0);
        }
        if end > self.limit {
            return Err(VmError::MemoryLimitExceeded {
                requested: end,
                max: self.limit,
            });
        }

        let new_word_size = end.div_ceil(WORD_SIZE);
        let old_word_size = self.word_size();
        self.data.resize(new_word_size * WORD_SIZE, 0);

        Ok(new_word_size - old_word_size)
    }

    /// Read a 32-byte word. Zero-padded past the end.
    #[must_use]
    pub fn read_word(&self, offset: usize) -> [u8; 32] {
        let mut result = [0u8; 32];
        self.fill(offset, &mut result);
        result
    }

    /// Read bytes. Zero-padded past the end.
    #[must_use]
    pub fn read_bytes(&self, offset: usize, size: usize) -> Vec<u8> {
        let mut result = vec![0u8; size];
        self.fill(offset, &mut result);
        result
    }

    fn fill(&self, offset: usize, out: &mut [u8]) {
        if offset >= self.data.len() {
            return;
        }
        let available = (self.data.len() - offset).min(out.len());
        out[..available].copy_from_slice(&self.data[offset..offset + available]);
    }

    /// Write a single byte, expanding if necessary.
    ///
    /// # Errors
    ///
    /// Returns error if expansion fails.
    pub fn write_byte(&mut self, offset: usize, value: u8) -> Result<usize, VmError> {
        self.write_bytes(offset, &[value])
    }

    /// Write a 32-byte word, expanding if necessary.
    ///
    /// # Errors
    ///
    /// Returns error if expansion fails.
    pub fn write_word(&mut self, offset: usize, value: &[u8; 32]) -> Result<usize, VmError> {
        self.write_bytes(offset, value)
    }

    /// Write bytes, expanding if necessary.
    ///
    /// # Errors
    ///
    /// Returns error if expansion fails.
    pub fn write_bytes(&mut self, offset: usize, data: &[u8]) -> Result<usize, VmError> {
        if data.is_empty() {
            return Ok(0);
        }
        let words_added = self.expand(offset, data.len())?;
        let region = offset..offset + data.len();
        if !self.marks.is_empty() {
            self.journal.push(Overwrite {
                offset,
                previous: self.data[region.clone()].to_vec(),
            });
        }
        self.data[region].copy_from_slice(data);
        Ok(words_added)
    }

    /// Get a reference to the underlying data.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl Journaled for Memory {
    fn checkpoint(&mut self) -> Checkpoint {
        self.marks.push(Mark {
            journal_len: self.journal.len(),
            data_len: self.data.len(),
        });
        Checkpoint(self.marks.len() - 1)
    }

    fn revert_to(&mut self, checkpoint: Checkpoint) {
        let Some(mark) = self.marks.get(checkpoint.0).copied() else {
            return;
        };
        while self.journal.len() > mark.journal_len {
            if let Some(entry) = self.journal.pop() {
                let end = entry.offset + entry.previous.len();
                self.data[entry.offset..end].copy_from_slice(&entry.previous);
            }
        }
        self.data.truncate(mark.data_len);
        self.marks.truncate(checkpoint.0);
    }

    fn commit(&mut self, checkpoint: Checkpoint) {
        self.marks.truncate(checkpoint.0);
        if self.marks.is_empty() {
            self.journal.clear();
        }
    }
}

/// Calculate memory gas cost.
///
/// Cost = (`word_size^2` / 512) + (3 * `word_size`)
#[must_use]
pub fn memory_gas_cost(word_size: usize) -> u64 {
    let word_size = word_size as u64;
    (word_size * word_size / 512) + (3 * word_size)
}

/// Calculate incremental gas cost for memory expansion.
#[must_use]
pub fn memory_expansion_cost(old_word_size: usize, new_word_size: usize) -> u64 {
    if new_word_size <= old_word_size {
        return 0;
    }
    memory_gas_cost(new_word_size) - memory_gas_cost(old_word_size)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand() {
        let mut mem = Memory::new();
        assert_eq!(mem.len(), 0);

        assert_eq!(mem.expand(0, 10).unwrap(), 1);
        assert_eq!(mem.len(), 32); // Rounded to word boundary

        assert_eq!(mem.expand(32, 32).unwrap(), 1);
        assert_eq!(mem.len(), 64);

        assert_eq!(mem.expand(1000, 0).unwrap(), 0);
        assert_eq!(mem.len(), 64);
    }

    #[test]
    fn test_read_write_word() {
        let mut mem = Memory::new();
        let word: [u8; 32] = [0x11; 32];
        mem.write_word(0, &word).unwrap();
        assert_eq!(mem.read_word(0), word);
    }

    #[test]
    fn test_read_zero_padding() {
        let mut mem = Memory::new();
        mem.write_bytes(30, &[1, 2]).unwrap();
        assert_eq!(mem.read_bytes(30, 4), vec![1, 2, 0, 0]);
        assert_eq!(mem.read_word(4096), [0u8; 32]);
    }

    #[test]
    fn test_limit() {
        let mut mem = Memory::with_limit(64);
        assert!(mem.write_byte(63, 1).is_ok());
        assert_eq!(
            mem.write_byte(64, 1),
            Err(VmError::MemoryLimitExceeded {
                requested: 65,
                max: 64
            })
        );
        assert!(mem.expand(usize::MAX, 2).is_err());
    }

    #[test]
    fn test_checkpoint_restores_bytes_and_length() {
        let mut mem = Memory::new();
        mem.write_bytes(0, &[1, 2, 3]).unwrap();

        let cp = mem.checkpoint();
        mem.write_bytes(1, &[9, 9]).unwrap();
        mem.write_byte(100, 7).unwrap();
        assert_eq!(mem.len(), 128);

        mem.revert_to(cp);
        assert_eq!(mem.len(), 32);
        assert_eq!(mem.read_bytes(0, 3), vec![1, 2, 3]);
    }

    #[test]
    fn test_nested_checkpoint_commit() {
        let mut mem = Memory::new();
        let outer = mem.checkpoint();
        mem.write_byte(0, 1).unwrap();
        let inner = mem.checkpoint();
        mem.write_byte(0, 2).unwrap();
        mem.commit(inner);
        assert_eq!(mem.read_bytes(0, 1), vec![2]);

        // Outer revert still undoes the committed inner write
        mem.revert_to(outer);
        assert!(mem.is_empty());
    }

    #[test]
    fn test_memory_gas_cost() {
        assert_eq!(memory_gas_cost(0), 0);
        assert_eq!(memory_gas_cost(1), 3);
        assert_eq!(memory_gas_cost(32), 98); // 32*32/512 + 3*32
        assert_eq!(memory_expansion_cost(1, 1), 0);
        assert_eq!(
            memory_expansion_cost(1, 2),
            memory_gas_cost(2) - memory_gas_cost(1)
        );
    }
}
