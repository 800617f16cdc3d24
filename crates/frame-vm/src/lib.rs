//! # Frame VM - Call-Frame Execution Core
//!
//! Call frames and the execution context of a gas-metered stack VM: per-frame
//! gas accounting, owned/shared container handles, the call return buffer,
//! log collection and revert propagation across nested calls.
//!
//! ## Frame Kinds
//!
//! | Kind | Stack / Memory / Storage | Created by |
//! |------|--------------------------|------------|
//! | Root | owned, storage seeded from [`context::WorldState`] | [`context::ExecutionContext::execute`] |
//! | External | owned (private), storage seeded from the nearest owner | `CALL`, `STATICCALL`, `CREATE` |
//! | Internal | shared with the parent, checkpointed | `CALLF` |
//!
//! ## Revert Propagation
//!
//! A successful child hands its logs, storage and refunds to its immediate
//! parent. A reverted child drops them and rolls shared containers back to
//! the checkpoints opened when it started. World state changes only when the
//! root frame succeeds.
//!
//! ## Components
//!
//! | Component | Location | Purpose |
//! |-----------|----------|---------|
//! | CallFrame | `frame/call_frame.rs` | Execution unit: gas, PC, outcome flags |
//! | ExecutionContext | `context.rs` | Frame stack, finish-child protocol, commit |
//! | Interpreter | `interpreter.rs` | Reference dispatcher |
//! | Containers | `evm/stack.rs`, `evm/memory.rs`, `evm/storage.rs` | Journaled leaf state |
//! | Gas | `evm/gas.rs`, `domain/gas.rs` | Cost table and per-frame meter |
//!
//! ## Usage Example
//!
//! ```
//! use frame_vm::prelude::*;
//!
//! let origin = Address::from_low_u8(0xAA);
//! let contract = Address::from_low_u8(0xC1);
//!
//! // PUSH1 0x2A PUSH1 0 SSTORE
//! let code = Bytes::from_slice(&[0x60, 0x2A, 0x60, 0x00, 0x55]);
//! let call = CallData::transaction(origin, contract, U256::zero(), Bytes::new());
//!
//! let mut ctx = ExecutionContext::new(TxnContext::new(origin, U256::one()), VmConfig::default());
//! let root = CallFrame::with_config(code, 100_000, &call, ctx.config());
//! let outcome = ctx.execute(root);
//!
//! assert!(outcome.success);
//! assert_eq!(ctx.world().load(&contract, &StorageKey::from(0u64)), U256::from(0x2A));
//! ```

// Crate-level lints
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]

// =============================================================================
// MODULES
// =============================================================================

pub mod config;
pub mod context;
pub mod domain;
pub mod errors;
pub mod evm;
pub mod frame;
pub mod interpreter;

// =============================================================================
// PRELUDE
// =============================================================================

/// Convenient re-exports for common usage.
pub mod prelude {
    // Configuration
    pub use crate::config::VmConfig;

    // Domain
    pub use crate::domain::entities::{
        CallData, CallType, ExecutionOutcome, FrameStatus, LogEntry, TxnContext,
    };
    pub use crate::domain::gas::GasMeter;
    pub use crate::domain::value_objects::{Address, Bytes, FrameId, StorageKey, Word, U256};

    // Frames and context
    pub use crate::context::{ExecutionContext, FinishedCall, WorldState};
    pub use crate::frame::{CallFrame, CallReturnBuffer, LogCollector, Resource, StagedResult};

    // Errors
    pub use crate::errors::{ConfigError, VmError};

    // VM components
    pub use crate::evm::{gas, Memory, Opcode, Stack, Storage};
    pub use crate::interpreter::Interpreter;
}

// =============================================================================
// CRATE INFO
// =============================================================================

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// =============================================================================
// TESTS
// =============================================================================
