//! # Call Frame
//!
//! The unit of execution: bytecode, program counter, gas meter, outcome
//! flags, and the stack/memory/storage triple it owns or shares.

use crate::config::VmConfig;
use crate::context::ExecutionContext;
use crate::domain::entities::{CallData, CallType, FrameStatus, LogEntry};
use crate::domain::gas::GasMeter;
use crate::domain::value_objects::{Address, Bytes, FrameId, Word};
use crate::errors::VmError;
use crate::evm::opcodes::{jump_destinations, Opcode};
use crate::evm::{Checkpoint, Journaled, Memory, Stack, Storage};
use crate::frame::logs::LogCollector;
use crate::frame::pending::PendingState;
use crate::frame::resource::Resource;
use crate::frame::return_buffer::{CallReturnBuffer, StagedResult};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, warn};

/// Checkpoints an internal frame holds on its parent's containers.
#[derive(Clone, Copy, Debug)]
struct SharedCheckpoints {
    stack: Checkpoint,
    memory: Checkpoint,
    storage: Checkpoint,
    pending: Checkpoint,
}

/// One execution unit of the call tree.
///
/// ## Invariants
/// - Gas only moves through [`CallFrame::consume_gas`] and
///   [`CallFrame::refund_gas`]; remaining gas never goes negative
/// - Once halted, pc and gas are frozen; only a revert can still change
///   the outcome
/// - Success and revert are mutually exclusive; a revert always wins
#[derive(Debug)]
pub struct CallFrame {
    id: FrameId,
    call_data: CallData,
    creation_mode: bool,
    bytecode: Bytes,
    jump_dests: Rc<HashSet<usize>>,
    pc: usize,
    gas: GasMeter,
    running: bool,
    success: bool,
    reverted: bool,
    out_of_gas: bool,
    exits_call: bool,
    revert_reason: Option<String>,
    return_data: Bytes,
    return_offset: usize,
    return_size: usize,
    stack: Resource<Stack>,
    memory: Resource<Memory>,
    storage: Resource<Storage>,
    pending: Resource<PendingState>,
    logs: LogCollector,
    return_buffer: CallReturnBuffer,
    last_return_data: Bytes,
    checkpoints: Option<SharedCheckpoints>,
}

impl CallFrame {
    // =========================================================================
    // CONSTRUCTION
    // =========================================================================

    /// Creates a root frame with fresh containers and default limits.
    #[must_use]
    pub fn new(bytecode: Bytes, initial_gas: u64, call_data: &CallData) -> Self {
        Self::with_config(bytecode, initial_gas, call_data, &VmConfig::default())
    }

    /// Creates a root frame with fresh containers sized from `config`.
    #[must_use]
    pub fn with_config(
        bytecode: Bytes,
        initial_gas: u64,
        call_data: &CallData,
        config: &VmConfig,
    ) -> Self {
        Self::with_owned_storage(bytecode, initial_gas, call_data, config, Storage::new())
    }

    /// Creates a frame owning `storage` and fresh stack, memory and overlay.
    pub(crate) fn with_owned_storage(
        bytecode: Bytes,
        initial_gas: u64,
        call_data: &CallData,
        config: &VmConfig,
        storage: Storage,
    ) -> Self {
        let jump_dests = Rc::new(jump_destinations(bytecode.as_slice()));
        Self {
            id: FrameId::new(),
            creation_mode: call_data.call_type == CallType::Create,
            call_data: call_data.clone(),
            bytecode,
            jump_dests,
            pc: 0,
            gas: GasMeter::new(initial_gas),
            running: true,
            success: false,
            reverted: false,
            out_of_gas: false,
            exits_call: false,
            revert_reason: None,
            return_data: Bytes::new(),
            return_offset: 0,
            return_size: 0,
            stack: Resource::owned(Stack::with_limit(config.max_stack_size)),
            memory: Resource::owned(Memory::with_limit(config.max_memory_size)),
            storage: Resource::owned(storage),
            pending: Resource::owned(PendingState::new()),
            logs: LogCollector::new(),
            return_buffer: CallReturnBuffer::new(),
            last_return_data: Bytes::new(),
            checkpoints: None,
        }
    }

    /// Creates an internal (jump-based) frame from the context's current frame.
    ///
    /// The child shares the parent's stack, memory and storage and starts at
    /// `jump_address`. Checkpoints are opened on the shared containers so a
    /// revert of the child can be undone.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveFrame` if the context is empty, or a handle error if
    /// the parent's containers are unavailable.
    pub fn internal(
        context: &ExecutionContext,
        jump_address: usize,
        gas_limit: u64,
    ) -> Result<Self, VmError> {
        let parent = context.current_frame()?;
        let stack = parent.stack.share();
        let memory = parent.memory.share();
        let storage = parent.storage.share();
        let pending = parent.pending.share();

        let checkpoints = SharedCheckpoints {
            stack: stack.with_mut(|s| s.checkpoint())?,
            memory: memory.with_mut(|m| m.checkpoint())?,
            storage: storage.with_mut(|s| s.checkpoint())?,
            pending: pending.with_mut(|p| p.checkpoint())?,
        };

        let call_data = CallData {
            origin: context.txn_context().tx_origin(),
            input_data: Bytes::new(),
            input_offset: 0,
            input_size: 0,
            call_type: CallType::Internal,
            is_static: parent.is_static(),
            ..parent.call_data.clone()
        };

        Ok(Self {
            id: FrameId::new(),
            call_data,
            creation_mode: false,
            bytecode: parent.bytecode.clone(),
            jump_dests: Rc::clone(&parent.jump_dests),
            pc: jump_address,
            gas: GasMeter::new(gas_limit),
            running: true,
            success: false,
            reverted: false,
            out_of_gas: false,
            exits_call: false,
            revert_reason: None,
            return_data: Bytes::new(),
            return_offset: 0,
            return_size: 0,
            stack,
            memory,
            storage,
            pending,
            logs: LogCollector::new(),
            return_buffer: CallReturnBuffer::new(),
            last_return_data: Bytes::new(),
            checkpoints: Some(checkpoints),
        })
    }

    /// Marks the frame as a contract-creation context. Cannot be undone.
    pub fn enable_creation_mode(&mut self) {
        self.creation_mode = true;
    }

    /// Replaces the executed bytecode.
    pub fn set_bytecode(&mut self, bytecode: Bytes) {
        self.jump_dests = Rc::new(jump_destinations(bytecode.as_slice()));
        self.bytecode = bytecode;
    }

    // =========================================================================
    // GAS
    // =========================================================================

    /// Debits gas. All-or-nothing.
    ///
    /// # Errors
    ///
    /// Returns `OutOfGas` if `amount` exceeds the remaining gas (the meter is
    /// unchanged), or `FrameHalted` if the frame is no longer running.
    pub fn consume_gas(&mut self, amount: u64) -> Result<(), VmError> {
        if !self.running {
            return Err(VmError::FrameHalted);
        }
        self.gas.consume(amount).inspect_err(|_| {
            warn!(
                frame_id = %self.id,
                requested = amount,
                gas_remaining = self.gas.remaining(),
                "out of gas"
            );
        })
    }

    /// Credits gas back. Ignored once the frame has halted.
    pub fn refund_gas(&mut self, amount: u64) {
        if !self.running {
            return;
        }
        self.gas.refund(amount);
        debug!(
            frame_id = %self.id,
            amount,
            gas_remaining = self.gas.remaining(),
            "gas refunded"
        );
    }

    /// Adds to the storage refund counter (applied at transaction end).
    pub fn record_refund(&mut self, amount: u64) {
        self.gas.add_refund(amount);
    }

    /// Remaining gas.
    #[must_use]
    pub fn gas_remaining(&self) -> u64 {
        self.gas.remaining()
    }

    /// Gas used so far.
    #[must_use]
    pub fn gas_used(&self) -> u64 {
        self.gas.used()
    }

    /// Accumulated storage refund counter.
    #[must_use]
    pub fn refund_counter(&self) -> u64 {
        self.gas.refund_counter()
    }

    // =========================================================================
    // OUTCOME
    // =========================================================================

    /// Stops the frame. A halted frame that never reverted counts as a
    /// success.
    pub fn halt(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        debug!(frame_id = %self.id, status = ?self.status(), "frame halted");
    }

    /// Records a successful outcome. Refused if the frame reverted.
    pub fn mark_success(&mut self) {
        if !self.reverted {
            self.success = true;
        }
    }

    /// Sets or clears the reverted flag, independently of whether the frame
    /// is still running. A revert overrides any recorded success.
    pub fn set_reverted(&mut self, reverted: bool, reason: impl Into<String>) {
        if reverted && self.success {
            debug!(frame_id = %self.id, "revert overrides recorded success");
        }
        self.reverted = reverted;
        if reverted {
            self.success = false;
            self.revert_reason = Some(reason.into());
        } else {
            self.out_of_gas = false;
            self.revert_reason = None;
        }
    }

    /// Converts an execution error into a terminal reverted state.
    ///
    /// Exceptional halts burn the remaining gas; a voluntary `Revert` keeps it.
    pub fn fail(&mut self, error: &VmError) {
        if !self.running {
            return;
        }
        if error.consumes_all_gas() {
            let remaining = self.gas.remaining();
            // Cannot fail: the debit equals what is left.
            let _ = self.gas.consume(remaining);
        }
        self.out_of_gas = *error == VmError::OutOfGas;
        self.set_reverted(true, error.revert_reason());
        self.halt();
    }

    /// Gas accounting state.
    #[must_use]
    pub fn status(&self) -> FrameStatus {
        if self.running {
            FrameStatus::Running
        } else if self.out_of_gas {
            FrameStatus::HaltedOutOfGas
        } else if self.reverted {
            FrameStatus::HaltedReverted
        } else {
            FrameStatus::HaltedSuccess
        }
    }

    /// Returns true while the frame is being stepped.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Returns true if the frame recorded success, or halted without a
    /// revert.
    #[must_use]
    pub fn is_success(&self) -> bool {
        !self.reverted && (self.success || !self.running)
    }

    /// Returns true if the frame reverted.
    #[must_use]
    pub fn is_reverted(&self) -> bool {
        self.reverted
    }

    /// Revert reason, if reverted.
    #[must_use]
    pub fn revert_reason(&self) -> Option<&str> {
        self.revert_reason.as_deref()
    }

    /// Marks an internal frame whose STOP/RETURN ends the enclosing call.
    pub(crate) fn set_exits_call(&mut self) {
        self.exits_call = true;
    }

    /// Returns true if this internal frame ended the enclosing call.
    #[must_use]
    pub fn exits_call(&self) -> bool {
        self.exits_call
    }

    // =========================================================================
    // RETURN DATA
    // =========================================================================

    /// Records the frame's return payload and the caller region it targets.
    pub fn set_return_data(&mut self, data: Bytes, offset: usize, size: usize) {
        self.return_data = data;
        self.return_offset = offset;
        self.return_size = size;
    }

    /// Records the return payload, keeping the target region.
    pub fn set_output(&mut self, data: Bytes) {
        self.return_data = data;
    }

    /// Return payload.
    #[must_use]
    pub fn return_data(&self) -> &Bytes {
        &self.return_data
    }

    /// Caller memory offset the return payload is destined for.
    #[must_use]
    pub fn return_offset(&self) -> usize {
        self.return_offset
    }

    /// Size of the caller memory region for the return payload.
    #[must_use]
    pub fn return_size(&self) -> usize {
        self.return_size
    }

    /// Return data of the most recently finished child.
    #[must_use]
    pub fn last_return_data(&self) -> &Bytes {
        &self.last_return_data
    }

    /// Replaces the most recent child's return data.
    pub fn set_last_return_data(&mut self, data: Bytes) {
        self.last_return_data = data;
    }

    // =========================================================================
    // RETURN BUFFER
    // =========================================================================

    /// Stages a finished child's return.
    pub fn cache_return(&mut self, offset: usize, size: usize, data: Bytes) {
        self.return_buffer.cache_return(offset, size, data);
    }

    /// Stages a finished child's revert.
    pub fn cache_reverted(&mut self, reason: impl Into<String>) {
        self.return_buffer.cache_reverted(reason);
    }

    /// Stages a finished child's revert with its payload.
    pub fn cache_reverted_output(&mut self, reason: impl Into<String>, data: Bytes) {
        self.return_buffer.cache_reverted_output(reason, data);
    }

    /// The return buffer.
    #[must_use]
    pub fn return_buffer(&self) -> &CallReturnBuffer {
        &self.return_buffer
    }

    /// Consumes the staged child outcome.
    pub fn take_staged(&mut self) -> StagedResult {
        self.return_buffer.take()
    }

    // =========================================================================
    // LOGS
    // =========================================================================

    /// Appends a log entry.
    pub fn add_log(&mut self, entry: LogEntry) {
        self.logs.add(entry);
    }

    /// Appends a batch of log entries; `None` or empty is a no-op.
    pub fn add_logs(&mut self, entries: Option<Vec<LogEntry>>) {
        self.logs.add_all(entries);
    }

    /// Logs emitted so far.
    #[must_use]
    pub fn logs(&self) -> &[LogEntry] {
        self.logs.entries()
    }

    /// Drains the emitted logs.
    pub fn take_logs(&mut self) -> Vec<LogEntry> {
        self.logs.take()
    }

    // =========================================================================
    // PROGRAM COUNTER
    // =========================================================================

    /// Current program counter.
    #[must_use]
    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Returns true if `pc` is inside the bytecode.
    #[must_use]
    pub fn has_more_code(&self) -> bool {
        self.pc < self.bytecode.len()
    }

    /// Opcode at `pc`, or `Unknown` past the end of code.
    #[must_use]
    pub fn current_op(&self) -> Opcode {
        self.current_byte().map_or(Opcode::Unknown, Opcode::from_byte)
    }

    /// Raw byte at `pc`.
    #[must_use]
    pub fn current_byte(&self) -> Option<u8> {
        self.bytecode.as_slice().get(self.pc).copied()
    }

    /// Moves `pc` forward by one.
    pub fn advance_pc(&mut self) {
        self.advance_pc_by(1);
    }

    /// Moves `pc` forward by `count`. No-op once halted.
    pub fn advance_pc_by(&mut self, count: usize) {
        if self.running {
            self.pc = self.pc.saturating_add(count);
        }
    }

    /// Sets `pc`. No-op once halted.
    pub fn update_pc(&mut self, new_pc: usize) {
        if self.running {
            self.pc = new_pc;
        }
    }

    /// Reads `size` immediate bytes after the opcode at `pc`, zero-padded.
    #[must_use]
    pub fn read_immediate(&self, size: usize) -> Word {
        let code = self.bytecode.as_slice();
        let mut bytes = [0u8; 32];
        let start = self.pc.saturating_add(1);
        for (i, slot) in bytes[32 - size.min(32)..].iter_mut().enumerate() {
            if let Some(byte) = code.get(start + i) {
                *slot = *byte;
            }
        }
        Word::from_big_endian(&bytes)
    }

    /// Returns true if `dest` is a `JUMPDEST` in this frame's code.
    #[must_use]
    pub fn is_valid_jump(&self, dest: usize) -> bool {
        self.jump_dests.contains(&dest)
    }

    // =========================================================================
    // CALL METADATA
    // =========================================================================

    /// Diagnostic id.
    #[must_use]
    pub fn id(&self) -> FrameId {
        self.id
    }

    /// Call request that seeded this frame.
    #[must_use]
    pub fn call_data(&self) -> &CallData {
        &self.call_data
    }

    /// Contract being executed.
    #[must_use]
    pub fn contract_address(&self) -> Address {
        self.call_data.contract_address
    }

    /// Immediate caller.
    #[must_use]
    pub fn caller(&self) -> Address {
        self.call_data.caller
    }

    /// Transaction origin.
    #[must_use]
    pub fn origin(&self) -> Address {
        self.call_data.origin
    }

    /// Transferred value.
    #[must_use]
    pub fn value(&self) -> Word {
        self.call_data.value
    }

    /// Call input.
    #[must_use]
    pub fn input_data(&self) -> &Bytes {
        &self.call_data.input_data
    }

    /// Kind of call.
    #[must_use]
    pub fn call_type(&self) -> CallType {
        self.call_data.call_type
    }

    /// Returns true in read-only mode.
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.call_data.is_static
    }

    /// Returns true for contract-creation frames.
    #[must_use]
    pub fn is_creation_mode(&self) -> bool {
        self.creation_mode
    }

    /// Executed bytecode.
    #[must_use]
    pub fn bytecode(&self) -> &Bytes {
        &self.bytecode
    }

    // =========================================================================
    // CONTAINERS
    // =========================================================================

    /// Stack handle.
    #[must_use]
    pub fn stack(&self) -> &Resource<Stack> {
        &self.stack
    }

    /// Memory handle.
    #[must_use]
    pub fn memory(&self) -> &Resource<Memory> {
        &self.memory
    }

    /// Storage handle.
    #[must_use]
    pub fn storage(&self) -> &Resource<Storage> {
        &self.storage
    }

    /// Pending state of descendants for accounts this frame does not own.
    #[must_use]
    pub fn pending(&self) -> &Resource<PendingState> {
        &self.pending
    }

    /// Runs `f` against the stack.
    ///
    /// # Errors
    ///
    /// Propagates handle errors and errors returned by `f`.
    pub fn with_stack<R>(
        &self,
        f: impl FnOnce(&mut Stack) -> Result<R, VmError>,
    ) -> Result<R, VmError> {
        self.stack.with_mut(f)?
    }

    /// Runs `f` against memory.
    ///
    /// # Errors
    ///
    /// Propagates handle errors and errors returned by `f`.
    pub fn with_memory<R>(
        &self,
        f: impl FnOnce(&mut Memory) -> Result<R, VmError>,
    ) -> Result<R, VmError> {
        self.memory.with_mut(f)?
    }

    /// Runs `f` against storage.
    ///
    /// # Errors
    ///
    /// Propagates handle errors.
    pub fn with_storage<R>(&self, f: impl FnOnce(&mut Storage) -> R) -> Result<R, VmError> {
        self.storage.with_mut(f)
    }

    /// Pushes onto the stack.
    ///
    /// # Errors
    ///
    /// Returns `StackOverflow` or a handle error.
    pub fn push(&self, value: Word) -> Result<(), VmError> {
        self.with_stack(|s| s.push(value))
    }

    /// Pops from the stack.
    ///
    /// # Errors
    ///
    /// Returns `StackUnderflow` or a handle error.
    pub fn pop(&self) -> Result<Word, VmError> {
        self.with_stack(Stack::pop)
    }

    /// Pops an offset or size.
    ///
    /// # Errors
    ///
    /// Returns `StackUnderflow` or a handle error.
    pub fn pop_usize(&self) -> Result<usize, VmError> {
        self.with_stack(Stack::pop_usize)
    }

    /// Commits (`keep`) or rolls back the checkpoints an internal frame
    /// opened on its parent's containers. No-op for other frames.
    pub(crate) fn settle_shared(&mut self, keep: bool) -> Result<(), VmError> {
        let Some(cps) = self.checkpoints.take() else {
            return Ok(());
        };
        settle(&self.stack, cps.stack, keep)?;
        settle(&self.memory, cps.memory, keep)?;
        settle(&self.storage, cps.storage, keep)?;
        settle(&self.pending, cps.pending, keep)
    }
}

fn settle<T: Journaled>(
    resource: &Resource<T>,
    checkpoint: Checkpoint,
    keep: bool,
) -> Result<(), VmError> {
    resource.with_mut(|t| {
        if keep {
            t.commit(checkpoint);
        } else {
            t.revert_to(checkpoint);
        }
    })
}

impl fmt::Display for CallFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CallFrame {{ id: {}, contract: {}, caller: {}, type: {:?}, pc: {}, gas_remaining: {}, gas_used: {}, running: {}, success: {}, reverted: {}, static: {}, creation: {} }}",
            self.id,
            self.call_data.contract_address,
            self.call_data.caller,
            self.call_data.call_type,
            self.pc,
            self.gas.remaining(),
            self.gas.used(),
            self.running,
            self.is_success(),
            self.reverted,
            self.call_data.is_static,
            self.creation_mode,
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::TxnContext;

    fn call_data() -> CallData {
        CallData::transaction(
            Address::from_low_u8(0xAA),
            Address::from_low_u8(0xCC),
            Word::zero(),
            Bytes::new(),
        )
    }

    fn root(code: &[u8], gas: u64) -> CallFrame {
        CallFrame::new(Bytes::from_slice(code), gas, &call_data())
    }

    #[test]
    fn test_root_frame_initial_state() {
        let frame = root(&[0x00], 100);
        assert!(frame.is_running());
        assert!(!frame.is_success());
        assert!(!frame.is_reverted());
        assert_eq!(frame.pc(), 0);
        assert_eq!(frame.gas_used(), 0);
        assert_eq!(frame.gas_remaining(), 100);
        assert!(frame.return_data().is_empty());
        assert!(frame.stack().is_owned());
        assert!(frame.memory().is_owned());
        assert!(frame.storage().is_owned());
        assert_eq!(frame.status(), FrameStatus::Running);
    }

    #[test]
    fn test_exhaust_gas_then_out_of_gas() {
        let mut frame = root(&[], 21_000);
        frame.consume_gas(21_000).unwrap();
        assert_eq!(frame.gas_remaining(), 0);

        assert_eq!(frame.consume_gas(1), Err(VmError::OutOfGas));
        assert_eq!(frame.gas_remaining(), 0);
        assert_eq!(frame.gas_used(), 21_000);
    }

    #[test]
    fn test_fail_out_of_gas() {
        let mut frame = root(&[], 50);
        let err = frame.consume_gas(60).unwrap_err();
        frame.fail(&err);

        assert!(!frame.is_running());
        assert!(!frame.is_success());
        assert!(frame.is_reverted());
        assert_eq!(frame.revert_reason(), Some("out of gas"));
        assert_eq!(frame.status(), FrameStatus::HaltedOutOfGas);
        assert_eq!(frame.gas_remaining(), 0);
    }

    #[test]
    fn test_voluntary_revert_keeps_gas() {
        let mut frame = root(&[], 50);
        frame.consume_gas(10).unwrap();
        frame.fail(&VmError::Revert("nope".into()));
        assert_eq!(frame.gas_remaining(), 40);
        assert_eq!(frame.status(), FrameStatus::HaltedReverted);
        assert_eq!(frame.revert_reason(), Some("nope"));
    }

    #[test]
    fn test_halted_frame_is_frozen() {
        let mut frame = root(&[0x01, 0x01, 0x01], 50);
        frame.halt();
        frame.advance_pc();
        frame.update_pc(2);
        frame.refund_gas(10);
        assert_eq!(frame.pc(), 0);
        assert_eq!(frame.gas_remaining(), 50);
        assert_eq!(frame.consume_gas(1), Err(VmError::FrameHalted));
    }

    #[test]
    fn test_halt_is_idempotent() {
        let mut frame = root(&[], 50);
        frame.halt();
        let once = frame.to_string();
        frame.halt();
        assert_eq!(frame.to_string(), once);
        assert_eq!(frame.status(), FrameStatus::HaltedSuccess);
    }

    #[test]
    fn test_set_reverted_and_success_are_exclusive() {
        let mut frame = root(&[], 50);
        frame.set_reverted(true, "reason");
        frame.mark_success();
        assert_eq!(frame.revert_reason(), Some("reason"));
        assert!(frame.is_reverted());
        assert!(!frame.is_success());
        frame.halt();
        assert!(!frame.is_success());

        let mut other = root(&[], 50);
        other.mark_success();
        other.set_reverted(true, "late");
        assert!(other.is_reverted());
        assert!(!other.is_success());
        assert_eq!(other.revert_reason(), Some("late"));
    }

    #[test]
    fn test_revert_after_halt() {
        let mut frame = root(&[], 50);
        frame.halt();
        assert!(frame.is_success());

        frame.set_reverted(true, "abort");
        assert!(frame.is_reverted());
        assert!(!frame.is_success());
        assert_eq!(frame.revert_reason(), Some("abort"));
        assert_eq!(frame.status(), FrameStatus::HaltedReverted);
        assert_eq!(frame.gas_remaining(), 50);
    }

    #[test]
    fn test_clearing_revert() {
        let mut frame = root(&[], 50);
        frame.set_reverted(true, "reason");
        frame.set_reverted(false, "");
        assert!(!frame.is_reverted());
        assert_eq!(frame.revert_reason(), None);
        frame.halt();
        assert!(frame.is_success());
    }

    #[test]
    fn test_pc_helpers() {
        let mut frame = root(&[0x60, 0x2A, 0x01], 50);
        assert_eq!(frame.current_op(), Opcode::Push(1));
        assert_eq!(frame.read_immediate(1), Word::from(0x2A));
        frame.advance_pc_by(2);
        assert_eq!(frame.current_op(), Opcode::Add);
        frame.advance_pc();
        assert!(!frame.has_more_code());
        assert_eq!(frame.current_op(), Opcode::Unknown);
    }

    #[test]
    fn test_read_immediate_pads_past_end() {
        let frame = root(&[0x61, 0x01], 50);
        assert_eq!(frame.read_immediate(2), Word::from(0x0100));
    }

    #[test]
    fn test_add_logs_ignores_none_and_empty() {
        let mut frame = root(&[], 50);
        frame.add_logs(None);
        frame.add_logs(Some(Vec::new()));
        assert!(frame.logs().is_empty());
    }

    #[test]
    fn test_return_buffer_revert_supersedes_return() {
        let mut frame = root(&[], 50);
        frame.cache_return(0, 32, Bytes::from_vec(vec![7; 32]));
        frame.cache_reverted("insufficient balance");
        assert_eq!(
            frame.return_buffer().revert_reason(),
            Some("insufficient balance")
        );
    }

    #[test]
    fn test_creation_mode_and_bytecode_swap() {
        let mut frame = root(&[0x00], 50);
        assert!(!frame.is_creation_mode());
        frame.enable_creation_mode();
        assert!(frame.is_creation_mode());

        frame.set_bytecode(Bytes::from_slice(&[0x5B, 0x00]));
        assert!(frame.is_valid_jump(0));
        assert!(!frame.is_valid_jump(1));
    }

    #[test]
    fn test_internal_frame_shares_stack() {
        let mut ctx = ExecutionContext::new(
            TxnContext::new(Address::from_low_u8(0xAA), Word::one()),
            VmConfig::for_testing(),
        );
        let parent = root(&[0x5B, 0x00], 1000);
        parent.push(Word::from(3)).unwrap();
        parent.push(Word::from(4)).unwrap();
        ctx.push_frame(parent).unwrap();

        let child = CallFrame::internal(&ctx, 0, 100).unwrap();
        assert_eq!(child.call_type(), CallType::Internal);
        assert_eq!(child.pc(), 0);
        assert_eq!(child.origin(), Address::from_low_u8(0xAA));
        assert!(!child.stack().is_owned());
        assert!(child.stack().ptr_eq(ctx.current_frame().unwrap().stack()));

        assert_eq!(child.pop().unwrap(), Word::from(4));
        assert_eq!(child.pop().unwrap(), Word::from(3));
        assert!(ctx.current_frame().unwrap().pop().is_err());
    }

    #[test]
    fn test_internal_frame_starts_without_input() {
        let mut ctx = ExecutionContext::new(
            TxnContext::new(Address::from_low_u8(0xAA), Word::one()),
            VmConfig::for_testing(),
        );
        let data = CallData::transaction(
            Address::from_low_u8(0xAA),
            Address::from_low_u8(0xCC),
            Word::from(5),
            Bytes::from_slice(&[1, 2, 3]),
        )
        .with_input_region(64, 3);
        let parent = CallFrame::new(Bytes::from_slice(&[0x5B, 0x00]), 1000, &data);
        ctx.push_frame(parent).unwrap();

        let child = CallFrame::internal(&ctx, 0, 100).unwrap();
        assert!(child.input_data().is_empty());
        assert_eq!(child.call_data().input_offset, 0);
        assert_eq!(child.call_data().input_size, 0);
        assert_eq!(child.contract_address(), Address::from_low_u8(0xCC));
        assert_eq!(child.caller(), Address::from_low_u8(0xAA));
        assert_eq!(child.value(), Word::from(5));
        assert_eq!(child.bytecode(), ctx.current_frame().unwrap().bytecode());
    }

    #[test]
    fn test_internal_rollback_restores_shared_containers() {
        let mut ctx = ExecutionContext::new(
            TxnContext::new(Address::from_low_u8(0xAA), Word::one()),
            VmConfig::for_testing(),
        );
        let parent = root(&[0x00], 1000);
        parent.push(Word::from(1)).unwrap();
        ctx.push_frame(parent).unwrap();

        let mut child = CallFrame::internal(&ctx, 0, 100).unwrap();
        child.push(Word::from(2)).unwrap();
        child
            .with_storage(|s| s.store(1u64.into(), Word::from(9)))
            .unwrap();
        child.settle_shared(false).unwrap();

        let parent = ctx.current_frame().unwrap();
        assert_eq!(parent.with_stack(|s| Ok(s.len())).unwrap(), 1);
        assert_eq!(
            parent.with_storage(|s| s.load(&1u64.into())).unwrap(),
            Word::zero()
        );
    }

    #[test]
    fn test_display_contains_diagnostics() {
        let frame = root(&[], 7);
        let text = frame.to_string();
        assert!(text.contains(&frame.id().to_string()));
        assert!(text.contains("gas_remaining: 7"));
    }
}
