//! # VM Containers and Instruction Set
//!
//! Leaf collaborators of the call-frame core.
//!
//! ## Components
//!
//! - `stack.rs` - Bounded operand stack
//! - `memory.rs` - Byte-addressable scratch memory
//! - `storage.rs` - Contract key/value storage
//! - `opcodes.rs` - Byte to instruction lookup
//! - `gas.rs` - Gas cost table
//!
//! Stack, memory and storage implement [`Journaled`] so a frame that shares
//! them with its parent can be rolled back on revert.

pub mod gas;
pub mod memory;
pub mod opcodes;
pub mod stack;
pub mod storage;

pub use memory::Memory;
pub use opcodes::Opcode;
pub use stack::Stack;
pub use storage::Storage;

/// Handle to a point a journaled container can be rolled back to.
///
/// Checkpoints nest: they must be reverted or committed in LIFO order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Checkpoint(pub(crate) usize);

/// Undo support for containers shared across frames.
pub trait Journaled {
    /// Opens a new checkpoint.
    fn checkpoint(&mut self) -> Checkpoint;

    /// Undoes every change made since `checkpoint` and closes it
    /// (and any checkpoint opened after it).
    fn revert_to(&mut self, checkpoint: Checkpoint);

    /// Keeps every change made since `checkpoint` and closes it.
    fn commit(&mut self, checkpoint: Checkpoint);
}
