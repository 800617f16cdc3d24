//! # Core Domain Entities
//!
//! Call requests, transaction-wide context, emitted logs and the final
//! outcome of a call tree.

use crate::domain::value_objects::{Address, Bytes, Word, U256};
use serde::{Deserialize, Serialize};

// =============================================================================
// CALL TYPE
// =============================================================================

/// Kind of call that created a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallType {
    /// Message call into another contract with fresh containers.
    External,
    /// Jump-based call within the same contract; shares the parent's containers.
    Internal,
    /// Read-only external call.
    Static,
    /// Contract deployment; return data becomes the deployed code.
    Create,
}

impl CallType {
    /// Returns true if frames of this kind get their own stack, memory and storage.
    #[must_use]
    pub fn has_private_containers(&self) -> bool {
        !matches!(self, Self::Internal)
    }
}

// =============================================================================
// CALL DATA
// =============================================================================

/// Immutable description of a call request; seeds a new root or external frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallData {
    /// Contract being executed.
    pub contract_address: Address,
    /// Immediate caller.
    pub caller: Address,
    /// Transaction sender (EOA that initiated the transaction).
    pub origin: Address,
    /// Value transferred.
    pub value: Word,
    /// Input data (calldata).
    pub input_data: Bytes,
    /// Offset in the caller's memory the input was read from.
    pub input_offset: usize,
    /// Size of the caller's memory region the input was read from.
    pub input_size: usize,
    /// Kind of call.
    pub call_type: CallType,
    /// Read-only mode.
    pub is_static: bool,
}

impl CallData {
    /// Top-level message call sent by `origin`.
    #[must_use]
    pub fn transaction(origin: Address, to: Address, value: Word, input: Bytes) -> Self {
        let size = input.len();
        Self {
            contract_address: to,
            caller: origin,
            origin,
            value,
            input_data: input,
            input_offset: 0,
            input_size: size,
            call_type: CallType::External,
            is_static: false,
        }
    }

    /// Nested message call from `caller` to `to`.
    #[must_use]
    pub fn external(
        origin: Address,
        caller: Address,
        to: Address,
        value: Word,
        input: Bytes,
    ) -> Self {
        Self {
            caller,
            ..Self::transaction(origin, to, value, input)
        }
    }

    /// Nested read-only call. Carries no value.
    #[must_use]
    pub fn static_call(origin: Address, caller: Address, to: Address, input: Bytes) -> Self {
        Self {
            call_type: CallType::Static,
            is_static: true,
            ..Self::external(origin, caller, to, U256::zero(), input)
        }
    }

    /// Contract deployment of `new_address` by `caller`; no calldata.
    #[must_use]
    pub fn create(origin: Address, caller: Address, new_address: Address, value: Word) -> Self {
        Self {
            call_type: CallType::Create,
            ..Self::external(origin, caller, new_address, value, Bytes::new())
        }
    }

    /// Records the caller-memory region the input was copied from.
    #[must_use]
    pub fn with_input_region(mut self, offset: usize, size: usize) -> Self {
        self.input_offset = offset;
        self.input_size = size;
        self
    }
}

// =============================================================================
// TRANSACTION CONTEXT
// =============================================================================

/// Transaction-level values shared by every frame of one call tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxnContext {
    /// Transaction sender.
    pub origin: Address,
    /// Gas price.
    pub gas_price: Word,
}

impl TxnContext {
    /// Creates a transaction context.
    #[must_use]
    pub fn new(origin: Address, gas_price: Word) -> Self {
        Self { origin, gas_price }
    }

    /// Transaction origin address.
    #[must_use]
    pub fn tx_origin(&self) -> Address {
        self.origin
    }
}

// =============================================================================
// LOG ENTRY
// =============================================================================

/// Emitted log (event) from contract execution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Contract address that emitted the log.
    pub address: Address,
    /// Indexed topics (up to 4).
    pub topics: Vec<Word>,
    /// Non-indexed data.
    pub data: Bytes,
}

impl LogEntry {
    /// Creates a new log.
    #[must_use]
    pub fn new(address: Address, topics: Vec<Word>, data: Bytes) -> Self {
        Self {
            address,
            topics,
            data,
        }
    }
}

// =============================================================================
// FRAME STATUS
// =============================================================================

/// Gas accounting state of a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameStatus {
    /// Still being stepped.
    Running,
    /// Halted normally.
    HaltedSuccess,
    /// Halted by a voluntary or exceptional revert.
    HaltedReverted,
    /// Halted because a gas debit was rejected.
    HaltedOutOfGas,
}

impl FrameStatus {
    /// Returns true for every halted state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

// =============================================================================
// EXECUTION OUTCOME
// =============================================================================

/// Result of running a whole call tree.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutionOutcome {
    /// Whether the root frame succeeded.
    pub success: bool,
    /// Return data (or revert data) of the root frame.
    pub output: Bytes,
    /// Gas charged after the capped refund.
    pub gas_used: u64,
    /// Refund applied to `gas_used`.
    pub gas_refund: u64,
    /// Logs of the root frame and every successful descendant.
    pub logs: Vec<LogEntry>,
    /// Revert reason (if failed).
    pub revert_reason: Option<String>,
    /// Address of the deployed contract for a successful root CREATE.
    pub created_address: Option<Address>,
}

/// Attempts to decode an `Error(string)` revert payload.
#[must_use]
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    // Error(string) selector: 0x08c379a0
    if data.len() < 68 || data[0..4] != [0x08, 0xc3, 0x79, 0xa0] {
        return None;
    }

    // Skip selector (4) + offset (32)
    let offset = 4 + 32;
    let len = U256::from_big_endian(&data[offset..offset + 32]);
    if len > U256::from(data.len()) {
        return None;
    }
    let len = len.as_usize();
    if data.len() < offset + 32 + len {
        return None;
    }

    String::from_utf8(data[offset + 32..offset + 32 + len].to_vec()).ok()
}

// =============================================================================
// TESTS
// =============================================================================
