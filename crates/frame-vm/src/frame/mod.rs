//! # Call Frames
//!
//! - `call_frame.rs` - The execution unit
//! - `resource.rs` - Owned/shared container handles
//! - `return_buffer.rs` - Staging slot for a finished child's outcome
//! - `logs.rs` - Per-frame log collector
//! - `pending.rs` - Uncommitted account changes of a call subtree

pub mod call_frame;
pub mod logs;
pub mod pending;
pub mod resource;
pub mod return_buffer;

pub use call_frame::CallFrame;
pub use logs::LogCollector;
pub use pending::{PendingState, SlotMap};
pub use resource::Resource;
pub use return_buffer::{CallReturnBuffer, StagedResult};
