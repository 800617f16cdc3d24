//! # Operand Stack
//!
//! Bounded LIFO stack of 256-bit words.

use crate::domain::value_objects::Word;
use crate::errors::VmError;
use crate::evm::{Checkpoint, Journaled};

/// Default maximum stack size.
pub const MAX_STACK_SIZE: usize = 1024;

/// Operand stack.
///
/// Checkpoints are whole-stack snapshots; the stack is small and bounded.
#[derive(Clone, Debug)]
pub struct Stack {
    data: Vec<Word>,
    limit: usize,
    snapshots: Vec<Vec<Word>>,
}

impl Default for Stack {
    fn default() -> Self {
        Self::new()
    }
}

impl Stack {
    /// Creates a new empty stack with the default limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_limit(MAX_STACK_SIZE)
    }

    /// Creates a new empty stack holding at most `limit` items.
    #[must_use]
    pub fn with_limit(limit: usize) -> Self {
        Self {
            data: Vec::with_capacity(limit.min(64)),
            limit,
            snapshots: Vec::new(),
        }
    }

    /// Returns the number of elements on the stack.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the stack is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Push a value onto the stack.
    ///
    /// # Errors
    ///
    /// Returns `StackOverflow` if the stack is full.
    pub fn push(&mut self, value: Word) -> Result<(), VmError> {
        if self.data.len() >= self.limit {
            return Err(VmError::StackOverflow);
        }
        self.data.push(value);
        Ok(())
    }

    /// Pop a value from the stack.
    ///
    /// # Errors
    ///
    /// Returns `StackUnderflow` if the stack is empty.
    pub fn pop(&mut self) -> Result<Word, VmError> {
        self.data.pop().ok_or(VmError::StackUnderflow)
    }

    /// Pop a value that must fit in `usize` (offsets, sizes).
    ///
    /// Values too large saturate to `usize::MAX`, which every bounded
    /// container then rejects.
    ///
    /// # Errors
    ///
    /// Returns `StackUnderflow` if the stack is empty.
    pub fn pop_usize(&mut self) -> Result<usize, VmError> {
        let value = self.pop()?;
        Ok(if value > Word::from(usize::MAX) {
            usize::MAX
        } else {
            value.as_usize()
        })
    }

    /// Peek at the top value without removing it.
    ///
    /// # Errors
    ///
    /// Returns `StackUnderflow` if the stack is empty.
    pub fn peek(&self) -> Result<Word, VmError> {
        self.data.last().copied().ok_or(VmError::StackUnderflow)
    }

    /// Peek at a value at a given depth (0 = top).
    ///
    /// # Errors
    ///
    /// Returns `StackUnderflow` if the index is out of bounds.
    pub fn peek_at(&self, depth: usize) -> Result<Word, VmError> {
        if depth >= self.data.len() {
            return Err(VmError::StackUnderflow);
        }
        Ok(self.data[self.data.len() - 1 - depth])
    }

    /// Swap the top element with the element at depth n (1-indexed).
    ///
    /// # Errors
    ///
    /// Returns `StackUnderflow` if not enough elements.
    pub fn swap(&mut self, n: usize) -> Result<(), VmError> {
        if n == 0 || n >= self.data.len() {
            return Err(VmError::StackUnderflow);
        }
        let len = self.data.len();
        self.data.swap(len - 1, len - 1 - n);
        Ok(())
    }

    /// Duplicate the element at depth n (1-indexed, DUP1 = top) and push it.
    ///
    /// # Errors
    ///
    /// Returns `StackUnderflow` if not enough elements, `StackOverflow` if full.
    pub fn dup(&mut self, n: usize) -> Result<(), VmError> {
        if n == 0 || n > self.data.len() {
            return Err(VmError::StackUnderflow);
        }
        let value = self.data[self.data.len() - n];
        self.push(value)
    }

    /// Get a reference to the underlying data for debugging.
    #[must_use]
    pub fn as_slice(&self) -> &[Word] {
        &self.data
    }
}

impl Journaled for Stack {
    fn checkpoint(&mut self) -> Checkpoint {
        self.snapshots.push(self.data.clone());
        Checkpoint(self.snapshots.len() - 1)
    }

    fn revert_to(&mut self, checkpoint: Checkpoint) {
        if let Some(snapshot) = self.snapshots.get(checkpoint.0) {
            self.data = snapshot.clone();
            self.snapshots.truncate(checkpoint.0);
        }
    }

    fn commit(&mut self, checkpoint: Checkpoint) {
        self.snapshots.truncate(checkpoint.0);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop() {
        let mut stack = Stack::new();
        stack.push(Word::from(42)).unwrap();
        stack.push(Word::from(100)).unwrap();

        assert_eq!(stack.len(), 2);
        assert_eq!(stack.pop().unwrap(), Word::from(100));
        assert_eq!(stack.pop().unwrap(), Word::from(42));
        assert!(stack.is_empty());
    }

    #[test]
    fn test_peek() {
        let mut stack = Stack::new();
        stack.push(Word::from(1)).unwrap();
        stack.push(Word::from(2)).unwrap();
        stack.push(Word::from(3)).unwrap();

        assert_eq!(stack.peek().unwrap(), Word::from(3));
        assert_eq!(stack.peek_at(2).unwrap(), Word::from(1));
        assert!(stack.peek_at(3).is_err());
    }

    #[test]
    fn test_swap() {
        let mut stack = Stack::new();
        stack.push(Word::from(1)).unwrap();
        stack.push(Word::from(2)).unwrap();
        stack.push(Word::from(3)).unwrap();

        // SWAP2: swap top with third
        stack.swap(2).unwrap();
        assert_eq!(stack.peek_at(0).unwrap(), Word::from(1));
        assert_eq!(stack.peek_at(2).unwrap(), Word::from(3));
        assert!(stack.swap(3).is_err());
    }

    #[test]
    fn test_dup() {
        let mut stack = Stack::new();
        stack.push(Word::from(1)).unwrap();
        stack.push(Word::from(2)).unwrap();

        // DUP2: duplicate second from top
        stack.dup(2).unwrap();
        assert_eq!(stack.len(), 3);
        assert_eq!(stack.peek().unwrap(), Word::from(1));
        assert!(stack.dup(4).is_err());
    }

    #[test]
    fn test_configured_limit() {
        let mut stack = Stack::with_limit(2);
        stack.push(Word::one()).unwrap();
        stack.push(Word::one()).unwrap();
        assert_eq!(stack.push(Word::one()), Err(VmError::StackOverflow));
        assert_eq!(stack.dup(1), Err(VmError::StackOverflow));
    }

    #[test]
    fn test_pop_usize_saturates() {
        let mut stack = Stack::new();
        stack.push(Word::MAX).unwrap();
        stack.push(Word::from(7)).unwrap();
        assert_eq!(stack.pop_usize().unwrap(), 7);
        assert_eq!(stack.pop_usize().unwrap(), usize::MAX);
    }

    #[test]
    fn test_checkpoint_revert_and_commit() {
        let mut stack = Stack::new();
        stack.push(Word::from(1)).unwrap();

        let outer = stack.checkpoint();
        stack.push(Word::from(2)).unwrap();
        let inner = stack.checkpoint();
        stack.pop().unwrap();
        stack.pop().unwrap();
        stack.revert_to(inner);
        assert_eq!(stack.as_slice(), &[Word::from(1), Word::from(2)]);

        stack.commit(outer);
        assert_eq!(stack.len(), 2);
    }
}
