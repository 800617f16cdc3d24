//! # Error Types
//!
//! All error types for call-frame execution and configuration.

use crate::domain::value_objects::Address;
use thiserror::Error;

// =============================================================================
// VM ERRORS
// =============================================================================

/// Errors that can occur while stepping a call frame.
///
/// None of these escape the call tree: the interpreter converts every one of
/// them into a terminal frame state (see [`crate::frame::CallFrame::fail`]).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    /// Gas debit exceeded the frame's remaining gas.
    #[error("out of gas")]
    OutOfGas,

    /// Stack overflow (push beyond the configured limit).
    #[error("stack overflow")]
    StackOverflow,

    /// Stack underflow (pop from empty stack).
    #[error("stack underflow")]
    StackUnderflow,

    /// Invalid opcode encountered.
    #[error("invalid opcode: 0x{0:02X}")]
    InvalidOpcode(u8),

    /// Invalid jump destination.
    #[error("invalid jump destination: {0}")]
    InvalidJump(usize),

    /// Call depth exceeded maximum.
    #[error("call depth exceeded: {depth} > {max}")]
    CallDepthExceeded {
        /// Depth the new frame would have run at.
        depth: usize,
        /// Configured depth limit.
        max: usize,
    },

    /// Attempted to modify state in static context.
    #[error("write operation in static context")]
    WriteInStaticContext,

    /// Memory expansion would exceed limit.
    #[error("memory limit exceeded: {requested} > {max} bytes")]
    MemoryLimitExceeded {
        /// Memory size in bytes after the expansion.
        requested: usize,
        /// Configured memory limit in bytes.
        max: usize,
    },

    /// Return data out of bounds (RETURNDATACOPY).
    #[error("return data out of bounds: offset {offset}, size {size}, available {available}")]
    ReturnDataOutOfBounds {
        /// Start of the requested range.
        offset: usize,
        /// Length of the requested range.
        size: usize,
        /// Bytes held in the return buffer.
        available: usize,
    },

    /// Execution reverted voluntarily.
    #[error("revert: {0}")]
    Revert(String),

    /// Gas or program counter mutation attempted on a halted frame.
    #[error("frame is halted")]
    FrameHalted,

    /// The execution context has no active frame.
    #[error("no active call frame")]
    NoActiveFrame,

    /// A shared container handle outlived the frame that owns it.
    #[error("dangling shared {0} handle")]
    DanglingHandle(&'static str),

    /// Contract already exists at CREATE address.
    #[error("contract already exists at address: {0:?}")]
    ContractAlreadyExists(Address),

    /// Contract code size exceeded limit.
    #[error("code size exceeded: {size} > {max} bytes")]
    CodeSizeExceeded {
        /// Size of the offending code in bytes.
        size: usize,
        /// Configured code size limit.
        max: usize,
    },

    /// Step budget for one transaction exhausted.
    #[error("execution step limit exceeded: {0}")]
    StepLimitExceeded(u64),

    /// Internal error (should not happen in production).
    #[error("internal error: {0}")]
    Internal(String),
}

impl VmError {
    /// Returns true if this error is recoverable (caller may continue).
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Revert(_))
    }

    /// Returns true if this error consumes all remaining gas of the frame.
    #[must_use]
    pub fn consumes_all_gas(&self) -> bool {
        !matches!(self, Self::Revert(_))
    }

    /// Reason string recorded on a frame that halts with this error.
    #[must_use]
    pub fn revert_reason(&self) -> String {
        match self {
            Self::Revert(reason) => reason.clone(),
            other => other.to_string(),
        }
    }
}

// =============================================================================
// CONFIG ERRORS
// =============================================================================

/// Errors from loading or validating [`crate::config::VmConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config content is not valid TOML for `VmConfig`.
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// A field holds a value the VM cannot run with.
    #[error("invalid config field `{field}`: {reason}")]
    Invalid {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

// =============================================================================
// TESTS
// =============================================================================
