//! # Execution Context
//!
//! Owns the call-frame stack of one transaction, the committed world state it
//! reads from, and the protocol for finishing a child frame.
//!
//! ## Storage visibility
//!
//! External frames get private storage seeded from the latest view of the
//! callee's account: the nearest active frame's pending state, or the nearest
//! frame executing that contract, or else [`WorldState`]. A successful frame
//! folds its storage into its immediate parent only, so a later revert of any
//! ancestor still discards it. [`WorldState`] changes only when the root
//! frame succeeds.

use crate::config::VmConfig;
use crate::domain::entities::{CallData, CallType, ExecutionOutcome, TxnContext};
use crate::domain::value_objects::{Address, Bytes, StorageKey, Word};
use crate::errors::VmError;
use crate::evm::gas::calculate_refund;
use crate::evm::{Memory, Stack, Storage};
use crate::frame::{CallFrame, PendingState, Resource, SlotMap};
use crate::interpreter::Interpreter;
use sha3::{Digest, Keccak256};
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

// =============================================================================
// WORLD STATE
// =============================================================================

/// Committed accounts: storage, deployed code and creator nonces.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorldState {
    storage: HashMap<Address, SlotMap>,
    code: HashMap<Address, Bytes>,
    nonces: HashMap<Address, u64>,
}

impl WorldState {
    /// Creates an empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: deploys `code` at `address`.
    #[must_use]
    pub fn with_code(mut self, address: Address, code: impl Into<Bytes>) -> Self {
        self.set_code(address, code.into());
        self
    }

    /// Deploys `code` at `address`.
    pub fn set_code(&mut self, address: Address, code: Bytes) {
        self.code.insert(address, code);
    }

    /// Code at `address`, if any.
    #[must_use]
    pub fn code(&self, address: &Address) -> Option<&Bytes> {
        self.code.get(address)
    }

    /// Returns true if non-empty code is deployed at `address`.
    #[must_use]
    pub fn has_code(&self, address: &Address) -> bool {
        self.code.get(address).is_some_and(|c| !c.is_empty())
    }

    /// Reads one slot.
    #[must_use]
    pub fn load(&self, address: &Address, key: &StorageKey) -> Word {
        self.storage
            .get(address)
            .and_then(|slots| slots.get(key))
            .copied()
            .unwrap_or_default()
    }

    /// Writes one slot; zero clears it.
    pub fn store(&mut self, address: Address, key: StorageKey, value: Word) {
        let slots = self.storage.entry(address).or_default();
        if value.is_zero() {
            slots.remove(&key);
        } else {
            slots.insert(key, value);
        }
    }

    /// Copy of every slot of `address`.
    #[must_use]
    pub fn storage_of(&self, address: &Address) -> SlotMap {
        self.storage.get(address).cloned().unwrap_or_default()
    }

    /// Replaces every slot of `address`.
    pub fn set_storage(&mut self, address: Address, slots: SlotMap) {
        self.storage
            .insert(address, slots.into_iter().filter(|(_, v)| !v.is_zero()).collect());
    }

    /// Number of contracts created by `creator` so far.
    #[must_use]
    pub fn nonce(&self, creator: &Address) -> u64 {
        self.nonces.get(creator).copied().unwrap_or_default()
    }

    /// Derives the next CREATE address of `creator` and bumps its nonce.
    pub fn next_create_address(&mut self, creator: &Address) -> Address {
        let nonce = self.nonces.entry(*creator).or_default();
        let address = contract_address(creator, *nonce);
        *nonce += 1;
        address
    }
}

/// CREATE address: `keccak256(rlp([sender, nonce]))[12..]`.
#[must_use]
pub fn contract_address(sender: &Address, nonce: u64) -> Address {
    // [0x94 ++ sender, nonce] never exceeds 55 bytes: short list header
    let mut content = Vec::with_capacity(30);
    content.push(0x80 + 20);
    content.extend_from_slice(sender.as_bytes());
    match nonce {
        0 => content.push(0x80),
        1..=127 => content.push(nonce as u8),
        _ => {
            let bytes = nonce.to_be_bytes();
            let start = bytes.iter().position(|&b| b != 0).unwrap_or(7);
            content.push(0x80 + (8 - start) as u8);
            content.extend_from_slice(&bytes[start..]);
        }
    }

    let mut rlp = Vec::with_capacity(content.len() + 1);
    rlp.push(0xc0 + content.len() as u8);
    rlp.extend_from_slice(&content);

    let hash = Keccak256::digest(&rlp);
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&hash[12..32]);
    Address::new(addr)
}

// =============================================================================
// FINISHED CALL
// =============================================================================

/// Summary of a child frame handed back to the dispatcher after
/// [`ExecutionContext::finish_child`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FinishedCall {
    /// Kind of call the child was.
    pub call_type: CallType,
    /// Contract the child executed (the new address for CREATE).
    pub address: Address,
    /// Whether the child succeeded.
    pub success: bool,
    /// Internal child ended with STOP/RETURN rather than RETF.
    pub exits_call: bool,
    /// Caller memory offset for the child's output.
    pub return_offset: usize,
    /// Caller memory size for the child's output.
    pub return_size: usize,
}

// =============================================================================
// EXECUTION CONTEXT
// =============================================================================

/// Call stack and transaction-wide state of one transaction.
#[derive(Debug)]
pub struct ExecutionContext {
    frames: Vec<CallFrame>,
    txn: TxnContext,
    world: WorldState,
    config: VmConfig,
}

impl ExecutionContext {
    /// Creates a context over an empty world.
    #[must_use]
    pub fn new(txn: TxnContext, config: VmConfig) -> Self {
        Self::with_world(txn, WorldState::new(), config)
    }

    /// Creates a context over `world`.
    #[must_use]
    pub fn with_world(txn: TxnContext, world: WorldState, config: VmConfig) -> Self {
        Self {
            frames: Vec::new(),
            txn,
            world,
            config,
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    /// Top of the call stack.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveFrame` if the stack is empty.
    pub fn current_frame(&self) -> Result<&CallFrame, VmError> {
        self.frames.last().ok_or(VmError::NoActiveFrame)
    }

    /// Top of the call stack, mutably.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveFrame` if the stack is empty.
    pub fn current_frame_mut(&mut self) -> Result<&mut CallFrame, VmError> {
        self.frames.last_mut().ok_or(VmError::NoActiveFrame)
    }

    /// Shared handle to the current frame's stack.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveFrame` if the stack is empty.
    pub fn current_stack(&self) -> Result<Resource<Stack>, VmError> {
        Ok(self.current_frame()?.stack().share())
    }

    /// Shared handle to the current frame's memory.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveFrame` if the stack is empty.
    pub fn current_memory(&self) -> Result<Resource<Memory>, VmError> {
        Ok(self.current_frame()?.memory().share())
    }

    /// Shared handle to the storage the current frame operates on.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveFrame` if the stack is empty.
    pub fn storage(&self) -> Result<Resource<Storage>, VmError> {
        Ok(self.current_frame()?.storage().share())
    }

    /// Bytecode of the current frame.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveFrame` if the stack is empty.
    pub fn current_code(&self) -> Result<&Bytes, VmError> {
        Ok(self.current_frame()?.bytecode())
    }

    /// Transaction-level values.
    #[must_use]
    pub fn txn_context(&self) -> &TxnContext {
        &self.txn
    }

    /// Number of active frames.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Execution limits.
    #[must_use]
    pub fn config(&self) -> &VmConfig {
        &self.config
    }

    /// Committed world state.
    #[must_use]
    pub fn world(&self) -> &WorldState {
        &self.world
    }

    /// Committed world state, mutably.
    pub fn world_mut(&mut self) -> &mut WorldState {
        &mut self.world
    }

    /// Consumes the context, returning the world state.
    #[must_use]
    pub fn into_world(self) -> WorldState {
        self.world
    }

    // =========================================================================
    // FRAME STACK
    // =========================================================================

    /// Pushes a frame, making it the active one.
    ///
    /// # Errors
    ///
    /// Returns `CallDepthExceeded` at the configured depth limit. An internal
    /// frame that is refused rolls back the checkpoints it opened.
    pub fn push_frame(&mut self, mut frame: CallFrame) -> Result<(), VmError> {
        let depth = self.frames.len() + 1;
        if depth > self.config.max_call_depth {
            frame.settle_shared(false)?;
            return Err(VmError::CallDepthExceeded {
                depth,
                max: self.config.max_call_depth,
            });
        }
        debug!(
            frame_id = %frame.id(),
            depth,
            call_type = ?frame.call_type(),
            contract = %frame.contract_address(),
            gas = frame.gas_remaining(),
            "frame pushed"
        );
        self.frames.push(frame);
        Ok(())
    }

    /// Removes the top frame without applying any outcome.
    pub fn pop_frame(&mut self) -> Option<CallFrame> {
        self.frames.pop()
    }

    /// Code at `address`, including code deployed by active frames' subtrees.
    ///
    /// # Errors
    ///
    /// Propagates handle errors.
    pub fn code_at(&self, address: &Address) -> Result<Bytes, VmError> {
        for frame in self.frames.iter().rev() {
            if let Some(code) = frame.pending().with(|p| p.code(address).cloned())? {
                return Ok(code);
            }
        }
        Ok(self.world.code(address).cloned().unwrap_or_default())
    }

    /// Latest slot view of `address` as seen from the top of the stack.
    fn storage_view(&self, address: &Address) -> Result<SlotMap, VmError> {
        for frame in self.frames.iter().rev() {
            if let Some(slots) = frame.pending().with(|p| p.storage(address).cloned())? {
                return Ok(slots);
            }
            if frame.contract_address() == *address {
                return frame.storage().with(Storage::snapshot);
            }
        }
        Ok(self.world.storage_of(address))
    }

    /// Builds a frame for an external, static or creation call with private
    /// containers. Its storage is seeded with the latest view of the callee.
    ///
    /// # Errors
    ///
    /// Propagates handle errors.
    pub fn prepare_external_frame(
        &self,
        code: Bytes,
        gas: u64,
        call_data: &CallData,
    ) -> Result<CallFrame, VmError> {
        let slots = self.storage_view(&call_data.contract_address)?;
        Ok(CallFrame::with_owned_storage(
            code,
            gas,
            call_data,
            &self.config,
            Storage::from_slots(slots),
        ))
    }

    /// Pops the halted top frame and applies its outcome to the parent.
    ///
    /// On success the child's logs and storage refunds move to the parent,
    /// internal checkpoints are committed, and private storage, pending state
    /// and deployed code fold into the parent. On revert the shared
    /// containers are rolled back and everything private is dropped. In both
    /// cases unused gas is refunded and the outcome is staged in the parent's
    /// return buffer.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveFrame` without a parent, `Internal` if the top frame
    /// is still running, or a handle error.
    pub fn finish_child(&mut self) -> Result<FinishedCall, VmError> {
        if self.frames.len() < 2 {
            return Err(VmError::NoActiveFrame);
        }
        let mut child = self.frames.pop().ok_or(VmError::NoActiveFrame)?;
        if child.is_running() {
            self.frames.push(child);
            return Err(VmError::Internal("cannot finish a running frame".into()));
        }

        let success = child.is_success();
        let logs = child.take_logs();
        let parent = self.frames.last_mut().ok_or(VmError::NoActiveFrame)?;

        if child.call_type() == CallType::Internal {
            child.settle_shared(success)?;
        } else if success {
            let slots = child.storage().with(Storage::snapshot)?;
            fold_storage(parent, child.contract_address(), slots)?;

            let (storage, code) = child.pending().with_mut(std::mem::take)?.into_parts();
            for (address, slots) in storage {
                fold_storage(parent, address, slots)?;
            }
            parent.pending().with_mut(|p| {
                for (address, code) in code {
                    p.set_code(address, code);
                }
                if child.is_creation_mode() {
                    p.set_code(child.contract_address(), child.return_data().clone());
                }
            })?;
        }

        if success {
            parent.add_logs(Some(logs));
            parent.record_refund(child.refund_counter());
            parent.cache_return(
                child.return_offset(),
                child.return_size(),
                child.return_data().clone(),
            );
        } else {
            parent.cache_reverted_output(
                child.revert_reason().unwrap_or_default(),
                child.return_data().clone(),
            );
        }
        parent.refund_gas(child.gas_remaining());

        debug!(
            frame_id = %child.id(),
            status = ?child.status(),
            gas_used = child.gas_used(),
            depth = self.frames.len() + 1,
            "frame finished"
        );

        Ok(FinishedCall {
            call_type: child.call_type(),
            address: child.contract_address(),
            success,
            exits_call: child.exits_call(),
            return_offset: child.return_offset(),
            return_size: child.return_size(),
        })
    }

    // =========================================================================
    // TRANSACTION
    // =========================================================================

    /// Runs `root` and every call it makes to completion.
    ///
    /// Never fails: every error becomes a failed outcome. On success the
    /// root's storage and pending state are committed to [`WorldState`].
    #[instrument(
        skip_all,
        fields(contract = %root.contract_address(), gas_limit = root.gas_remaining())
    )]
    pub fn execute(&mut self, root: CallFrame) -> ExecutionOutcome {
        self.frames.clear();
        let address = root.contract_address();

        if root.is_creation_mode() && self.world.has_code(&address) {
            return failed_outcome(&VmError::ContractAlreadyExists(address));
        }
        if root.storage().is_owned() {
            let seeded = Storage::from_slots(self.world.storage_of(&address));
            if let Err(err) = root.with_storage(|s| *s = seeded) {
                return failed_outcome(&err);
            }
        }
        if let Err(err) = self.push_frame(root) {
            return failed_outcome(&err);
        }

        let mut interpreter = Interpreter::new(self.config.clone());
        if let Err(err) = interpreter.run(self) {
            warn!(error = %err, steps = interpreter.steps(), "call tree aborted");
            self.frames.truncate(1);
            if let Ok(root) = self.current_frame_mut() {
                root.fail(&err);
            }
        }

        let Some(root) = self.frames.pop() else {
            return failed_outcome(&VmError::NoActiveFrame);
        };
        self.frames.clear();
        self.conclude(root)
    }

    fn conclude(&mut self, mut root: CallFrame) -> ExecutionOutcome {
        let mut outcome = ExecutionOutcome {
            success: root.is_success(),
            output: root.return_data().clone(),
            gas_used: root.gas_used(),
            revert_reason: root.revert_reason().map(str::to_owned),
            ..ExecutionOutcome::default()
        };

        if !outcome.success {
            info!(
                reason = outcome.revert_reason.as_deref().unwrap_or_default(),
                gas_used = outcome.gas_used,
                "transaction reverted"
            );
            return outcome;
        }

        if let Err(err) = self.commit_root(&root) {
            return failed_outcome(&err);
        }

        let refund = calculate_refund(
            root.gas_used(),
            root.refund_counter(),
            self.config.max_refund_quotient,
        );
        outcome.gas_refund = refund;
        outcome.gas_used -= refund;
        outcome.logs = root.take_logs();
        if root.is_creation_mode() {
            outcome.created_address = Some(root.contract_address());
        }

        info!(
            gas_used = outcome.gas_used,
            gas_refund = refund,
            logs = outcome.logs.len(),
            "transaction succeeded"
        );
        outcome
    }

    fn commit_root(&mut self, root: &CallFrame) -> Result<(), VmError> {
        let slots = root.storage().with(Storage::snapshot)?;
        let pending: PendingState = root.pending().with_mut(std::mem::take)?;

        self.world.set_storage(root.contract_address(), slots);
        let (storage, code) = pending.into_parts();
        for (address, slots) in storage {
            self.world.set_storage(address, slots);
        }
        for (address, code) in code {
            self.world.set_code(address, code);
        }
        if root.is_creation_mode() {
            self.world
                .set_code(root.contract_address(), root.return_data().clone());
        }
        Ok(())
    }
}

/// Folds a successful child's view of `address` into its parent.
fn fold_storage(parent: &CallFrame, address: Address, slots: SlotMap) -> Result<(), VmError> {
    if parent.contract_address() == address {
        parent.with_storage(|s| s.merge_from(&Storage::from_slots(slots)))
    } else {
        parent.pending().with_mut(|p| p.set_storage(address, slots))
    }
}

fn failed_outcome(error: &VmError) -> ExecutionOutcome {
    warn!(error = %error, "transaction failed before execution");
    ExecutionOutcome {
        success: false,
        revert_reason: Some(error.revert_reason()),
        ..ExecutionOutcome::default()
    }
}

// =============================================================================
// TESTS
// =============================================================================
