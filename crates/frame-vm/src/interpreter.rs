//! # Interpreter
//!
//! Reference dispatcher. Steps the active frame of an [`ExecutionContext`],
//! opens child frames for calls, and hands finished children back to their
//! parents until the root frame halts.
//!
//! Every [`VmError`] raised while stepping is converted into a terminal state
//! of the frame that raised it; only context-level failures (step limit,
//! dangling handles) abort the run.

use crate::config::VmConfig;
use crate::context::{ExecutionContext, FinishedCall};
use crate::domain::entities::{decode_revert_reason, CallData, CallType, LogEntry};
use crate::domain::value_objects::{Address, Bytes, StorageKey, Word};
use crate::errors::VmError;
use crate::evm::gas::{
    calculate_call_gas, code_deposit_gas, copy_gas_cost, costs, create_dynamic_gas,
    log_dynamic_gas, sstore_gas, static_gas,
};
use crate::evm::memory::memory_expansion_cost;
use crate::evm::opcodes::Opcode;
use crate::frame::{CallFrame, StagedResult};
use tracing::{debug, instrument, trace};

/// Reason recorded for a REVERT without a decodable `Error(string)` payload.
pub const DEFAULT_REVERT_REASON: &str = "execution reverted";

/// Step-loop driver.
#[derive(Debug)]
pub struct Interpreter {
    config: VmConfig,
    steps: u64,
}

impl Interpreter {
    /// Creates an interpreter with the given limits.
    #[must_use]
    pub fn new(config: VmConfig) -> Self {
        Self { config, steps: 0 }
    }

    /// Instructions executed so far.
    #[must_use]
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Runs until the bottom frame of `context` halts.
    ///
    /// # Errors
    ///
    /// Returns `StepLimitExceeded` when the step budget runs out, or a
    /// context-level error (no active frame, dangling handle). Frame-level
    /// errors never surface here.
    #[instrument(skip_all, fields(depth = context.depth()))]
    pub fn run(&mut self, context: &mut ExecutionContext) -> Result<(), VmError> {
        loop {
            if !context.current_frame()?.is_running() {
                if context.depth() == 1 {
                    return Ok(());
                }
                let finished = context.finish_child()?;
                if let Err(err) = self.resume(context, &finished) {
                    context.current_frame_mut()?.fail(&err);
                }
                continue;
            }

            self.steps += 1;
            if self.steps > self.config.max_execution_steps {
                return Err(VmError::StepLimitExceeded(self.config.max_execution_steps));
            }

            if let Err(err) = self.step(context) {
                let frame = context.current_frame_mut()?;
                debug!(frame_id = %frame.id(), pc = frame.pc(), error = %err, "frame failed");
                frame.fail(&err);
            }
        }
    }

    /// Executes one instruction of the active frame.
    fn step(&self, context: &mut ExecutionContext) -> Result<(), VmError> {
        let frame = context.current_frame_mut()?;
        let op = frame.current_op();
        trace!(
            frame_id = %frame.id(),
            pc = frame.pc(),
            ?op,
            gas_remaining = frame.gas_remaining(),
            "step"
        );

        if op == Opcode::Unknown {
            // Past the end of code is an implicit STOP
            return match frame.current_byte() {
                None => {
                    stop(frame);
                    Ok(())
                }
                Some(byte) => Err(VmError::InvalidOpcode(byte)),
            };
        }
        if frame.is_static() && op.is_state_modifying() {
            return Err(VmError::WriteInStaticContext);
        }
        frame.consume_gas(static_gas(op))?;

        match op {
            Opcode::CallF => self.call_internal(context),
            Opcode::Call | Opcode::StaticCall => self.call_external(context, op),
            Opcode::Create => self.create(context),
            _ => self.execute(context.current_frame_mut()?, op),
        }
    }

    // =========================================================================
    // FRAME-LOCAL INSTRUCTIONS
    // =========================================================================

    #[allow(clippy::too_many_lines)]
    fn execute(&self, frame: &mut CallFrame, op: Opcode) -> Result<(), VmError> {
        let pc = frame.pc();
        let immediate = frame.read_immediate(op.immediate_size());
        frame.advance_pc_by(1 + op.immediate_size());

        match op {
            // =================================================================
            // STOP & ARITHMETIC
            // =================================================================
            Opcode::Stop => stop(frame),

            Opcode::Add => {
                let a = frame.pop()?;
                let b = frame.pop()?;
                frame.push(a.overflowing_add(b).0)?;
            }

            Opcode::Mul => {
                let a = frame.pop()?;
                let b = frame.pop()?;
                frame.push(a.overflowing_mul(b).0)?;
            }

            Opcode::Sub => {
                let a = frame.pop()?;
                let b = frame.pop()?;
                frame.push(a.overflowing_sub(b).0)?;
            }

            // =================================================================
            // COMPARISON
            // =================================================================
            Opcode::Lt => {
                let a = frame.pop()?;
                let b = frame.pop()?;
                frame.push(bool_word(a < b))?;
            }

            Opcode::Gt => {
                let a = frame.pop()?;
                let b = frame.pop()?;
                frame.push(bool_word(a > b))?;
            }

            Opcode::Eq => {
                let a = frame.pop()?;
                let b = frame.pop()?;
                frame.push(bool_word(a == b))?;
            }

            Opcode::IsZero => {
                let a = frame.pop()?;
                frame.push(bool_word(a.is_zero()))?;
            }

            // =================================================================
            // CALL ENVIRONMENT
            // =================================================================
            Opcode::Caller => frame.push(frame.caller().to_word())?,

            Opcode::CallValue => frame.push(frame.value())?,

            Opcode::CallDataLoad => {
                let offset = frame.pop_usize()?;
                let word = word_at(frame.input_data().as_slice(), offset);
                frame.push(word)?;
            }

            Opcode::CallDataSize => frame.push(Word::from(frame.input_data().len()))?,

            Opcode::ReturnDataSize => frame.push(Word::from(frame.last_return_data().len()))?,

            Opcode::ReturnDataCopy => {
                let dest_offset = frame.pop_usize()?;
                let data_offset = frame.pop_usize()?;
                let size = frame.pop_usize()?;

                let available = frame.last_return_data().len();
                let end = data_offset
                    .checked_add(size)
                    .filter(|end| *end <= available)
                    .ok_or(VmError::ReturnDataOutOfBounds {
                        offset: data_offset,
                        size,
                        available,
                    })?;

                charge_memory(frame, dest_offset, size)?;
                frame.consume_gas(copy_gas_cost(size))?;

                let data = frame.last_return_data().as_slice()[data_offset..end].to_vec();
                frame.with_memory(|m| m.write_bytes(dest_offset, &data))?;
            }

            // =================================================================
            // STACK, MEMORY, STORAGE
            // =================================================================
            Opcode::Pop => {
                frame.pop()?;
            }

            Opcode::MLoad => {
                let offset = frame.pop_usize()?;
                charge_memory(frame, offset, 32)?;
                let value = frame.with_memory(|m| Ok(m.read_word(offset)))?;
                frame.push(Word::from_big_endian(&value))?;
            }

            Opcode::MStore => {
                let offset = frame.pop_usize()?;
                let value = frame.pop()?;
                charge_memory(frame, offset, 32)?;
                let mut bytes = [0u8; 32];
                value.to_big_endian(&mut bytes);
                frame.with_memory(|m| m.write_word(offset, &bytes))?;
            }

            Opcode::MStore8 => {
                let offset = frame.pop_usize()?;
                let value = frame.pop()?;
                charge_memory(frame, offset, 1)?;
                frame.with_memory(|m| m.write_byte(offset, value.byte(0)))?;
            }

            Opcode::SLoad => {
                let key = StorageKey::from(frame.pop()?);
                let value = frame.with_storage(|s| s.load(&key))?;
                frame.push(value)?;
            }

            Opcode::SStore => {
                let key = StorageKey::from(frame.pop()?);
                let value = frame.pop()?;
                let current = frame.with_storage(|s| s.load(&key))?;

                frame.consume_gas(sstore_gas(current.is_zero(), value.is_zero()))?;
                if !current.is_zero() && value.is_zero() {
                    frame.record_refund(costs::SSTORE_CLEAR_REFUND);
                }
                frame.with_storage(|s| s.store(key, value))?;
            }

            // =================================================================
            // FLOW
            // =================================================================
            Opcode::Jump => {
                let dest = frame.pop_usize()?;
                jump(frame, dest)?;
            }

            Opcode::JumpI => {
                let dest = frame.pop_usize()?;
                let condition = frame.pop()?;
                if !condition.is_zero() {
                    jump(frame, dest)?;
                }
            }

            Opcode::Pc => frame.push(Word::from(pc))?,

            Opcode::MSize => {
                let size = frame.with_memory(|m| Ok(m.len()))?;
                frame.push(Word::from(size))?;
            }

            Opcode::Gas => frame.push(Word::from(frame.gas_remaining()))?,

            Opcode::JumpDest => {}

            // =================================================================
            // PUSH, DUP, SWAP
            // =================================================================
            Opcode::Push(_) => frame.push(immediate)?,

            Opcode::Dup(n) => frame.with_stack(|s| s.dup(usize::from(n)))?,

            Opcode::Swap(n) => frame.with_stack(|s| s.swap(usize::from(n)))?,

            // =================================================================
            // LOGGING
            // =================================================================
            Opcode::Log(topic_count) => {
                let offset = frame.pop_usize()?;
                let size = frame.pop_usize()?;
                let mut topics = Vec::with_capacity(usize::from(topic_count));
                for _ in 0..topic_count {
                    topics.push(frame.pop()?);
                }

                charge_memory(frame, offset, size)?;
                frame.consume_gas(log_dynamic_gas(size, usize::from(topic_count)))?;

                let data = frame.with_memory(|m| Ok(m.read_bytes(offset, size)))?;
                let entry = LogEntry::new(frame.contract_address(), topics, Bytes::from_vec(data));
                frame.add_log(entry);
            }

            // =================================================================
            // HALTING
            // =================================================================
            Opcode::RetF => {
                if frame.call_type() != CallType::Internal {
                    return Err(VmError::InvalidOpcode(0xE4));
                }
                frame.mark_success();
                frame.halt();
            }

            Opcode::Return => {
                let offset = frame.pop_usize()?;
                let size = frame.pop_usize()?;
                charge_memory(frame, offset, size)?;
                let data = frame.with_memory(|m| Ok(m.read_bytes(offset, size)))?;
                self.complete_return(frame, Bytes::from_vec(data))?;
            }

            Opcode::Revert => {
                let offset = frame.pop_usize()?;
                let size = frame.pop_usize()?;
                charge_memory(frame, offset, size)?;
                let data = frame.with_memory(|m| Ok(m.read_bytes(offset, size)))?;
                let reason = decode_revert_reason(&data)
                    .unwrap_or_else(|| DEFAULT_REVERT_REASON.to_string());
                frame.set_output(Bytes::from_vec(data));
                frame.set_reverted(true, reason);
                frame.halt();
            }

            Opcode::Invalid => return Err(VmError::InvalidOpcode(0xFE)),

            Opcode::CallF
            | Opcode::Call
            | Opcode::StaticCall
            | Opcode::Create
            | Opcode::Unknown => {
                return Err(VmError::Internal(format!(
                    "{op:?} dispatched as a frame-local instruction"
                )));
            }
        }

        Ok(())
    }

    /// Halts `frame` successfully with `data` as output. Creation frames
    /// pay for and bound the deployed code.
    fn complete_return(&self, frame: &mut CallFrame, data: Bytes) -> Result<(), VmError> {
        if frame.is_creation_mode() {
            if data.len() > self.config.max_code_size {
                return Err(VmError::CodeSizeExceeded {
                    size: data.len(),
                    max: self.config.max_code_size,
                });
            }
            frame.consume_gas(code_deposit_gas(data.len()))?;
        }
        frame.set_output(data);
        stop(frame);
        Ok(())
    }

    // =========================================================================
    // CALLS
    // =========================================================================

    /// CALLF: pops target and gas, opens an internal frame at the target.
    fn call_internal(&self, context: &mut ExecutionContext) -> Result<(), VmError> {
        let depth = context.depth();
        let frame = context.current_frame_mut()?;
        let target = frame.pop_usize()?;
        let requested = saturating_u64(frame.pop()?);
        frame.advance_pc();

        if !frame.is_valid_jump(target) {
            return Err(VmError::InvalidJump(target));
        }
        if depth >= self.config.max_call_depth {
            return Err(VmError::CallDepthExceeded {
                depth: depth + 1,
                max: self.config.max_call_depth,
            });
        }

        let gas = requested.min(frame.gas_remaining());
        frame.consume_gas(gas)?;

        let child = CallFrame::internal(context, target, gas)?;
        context.push_frame(child)
    }

    /// CALL / STATICCALL: opens an external frame with private containers.
    fn call_external(&self, context: &mut ExecutionContext, op: Opcode) -> Result<(), VmError> {
        let depth = context.depth();
        let origin = context.txn_context().tx_origin();
        let frame = context.current_frame_mut()?;

        let requested = saturating_u64(frame.pop()?);
        let to = Address::from_word(frame.pop()?);
        let value = if op == Opcode::Call {
            frame.pop()?
        } else {
            Word::zero()
        };
        let args_offset = frame.pop_usize()?;
        let args_size = frame.pop_usize()?;
        let ret_offset = frame.pop_usize()?;
        let ret_size = frame.pop_usize()?;
        frame.advance_pc();

        if frame.is_static() && !value.is_zero() {
            return Err(VmError::WriteInStaticContext);
        }
        charge_memory(frame, args_offset, args_size)?;
        charge_memory(frame, ret_offset, ret_size)?;
        if !value.is_zero() {
            frame.consume_gas(costs::CALL_VALUE)?;
        }
        frame.set_last_return_data(Bytes::new());

        if depth >= self.config.max_call_depth {
            debug!(depth, "call depth limit reached");
            return frame.push(Word::zero());
        }

        let gas = calculate_call_gas(frame.gas_remaining(), requested);
        frame.consume_gas(gas)?;
        let child_gas = if value.is_zero() {
            gas
        } else {
            gas.saturating_add(costs::CALL_STIPEND)
        };

        let input = frame.with_memory(|m| Ok(m.read_bytes(args_offset, args_size)))?;
        let input = Bytes::from_vec(input);
        let caller = frame.contract_address();
        let call_data = if frame.is_static() || op == Opcode::StaticCall {
            CallData::static_call(origin, caller, to, input)
        } else {
            CallData::external(origin, caller, to, value, input)
        };
        let call_data = call_data.with_input_region(args_offset, args_size);

        let code = context.code_at(&to)?;
        let mut child = context.prepare_external_frame(code, child_gas, &call_data)?;
        child.set_return_data(Bytes::new(), ret_offset, ret_size);
        context.push_frame(child)
    }

    /// CREATE: runs init code in a creation frame at a derived address.
    fn create(&self, context: &mut ExecutionContext) -> Result<(), VmError> {
        let depth = context.depth();
        let origin = context.txn_context().tx_origin();
        let frame = context.current_frame_mut()?;

        let value = frame.pop()?;
        let offset = frame.pop_usize()?;
        let size = frame.pop_usize()?;
        frame.advance_pc();

        if size > self.config.max_init_code_size {
            return Err(VmError::CodeSizeExceeded {
                size,
                max: self.config.max_init_code_size,
            });
        }
        charge_memory(frame, offset, size)?;
        frame.consume_gas(create_dynamic_gas(size))?;
        frame.set_last_return_data(Bytes::new());

        if depth >= self.config.max_call_depth {
            debug!(depth, "create depth limit reached");
            return frame.push(Word::zero());
        }

        let init_code = Bytes::from_vec(frame.with_memory(|m| Ok(m.read_bytes(offset, size)))?);
        let creator = frame.contract_address();
        let gas = calculate_call_gas(frame.gas_remaining(), frame.gas_remaining());

        let address = context.world_mut().next_create_address(&creator);
        let collision = !context.code_at(&address)?.is_empty();
        let frame = context.current_frame_mut()?;
        frame.consume_gas(gas)?;
        if collision {
            debug!(%address, "create collision");
            return frame.push(Word::zero());
        }

        let call_data = CallData::create(origin, creator, address, value);
        let child = context.prepare_external_frame(init_code, gas, &call_data)?;
        context.push_frame(child)
    }

    /// Applies a finished child's staged outcome to the now-active parent.
    fn resume(
        &self,
        context: &mut ExecutionContext,
        finished: &FinishedCall,
    ) -> Result<(), VmError> {
        let frame = context.current_frame_mut()?;
        let staged = frame.take_staged();

        match (finished.call_type, staged) {
            (_, StagedResult::Empty) => Err(VmError::Internal(
                "finished child staged no result".into(),
            )),

            (CallType::Internal, StagedResult::Reverted { reason, data }) => {
                // The payload travels up with the revert.
                frame.set_output(data);
                Err(VmError::Revert(reason))
            }
            (CallType::Internal, StagedResult::Returned { data, .. }) => {
                if finished.exits_call {
                    self.complete_return(frame, data)?;
                }
                Ok(())
            }

            (CallType::Create, StagedResult::Returned { .. }) => {
                frame.push(finished.address.to_word())
            }
            (CallType::Create, StagedResult::Reverted { data, .. }) => {
                frame.set_last_return_data(data);
                frame.push(Word::zero())
            }

            (
                CallType::External | CallType::Static,
                StagedResult::Returned { offset, size, data },
            ) => {
                copy_output(frame, offset, size, &data)?;
                frame.set_last_return_data(data);
                frame.push(Word::one())
            }
            (CallType::External | CallType::Static, StagedResult::Reverted { data, .. }) => {
                copy_output(frame, finished.return_offset, finished.return_size, &data)?;
                frame.set_last_return_data(data);
                frame.push(Word::zero())
            }
        }
    }
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Normal halt. STOP inside an internal frame ends the enclosing call.
fn stop(frame: &mut CallFrame) {
    frame.mark_success();
    if frame.call_type() == CallType::Internal {
        frame.set_exits_call();
    }
    frame.halt();
}

fn jump(frame: &mut CallFrame, dest: usize) -> Result<(), VmError> {
    if !frame.is_valid_jump(dest) {
        return Err(VmError::InvalidJump(dest));
    }
    frame.update_pc(dest);
    Ok(())
}

/// Expands memory over `[offset, offset + size)` and charges for new words.
fn charge_memory(frame: &mut CallFrame, offset: usize, size: usize) -> Result<(), VmError> {
    if size == 0 {
        return Ok(());
    }
    let (old_words, new_words) = frame.with_memory(|m| {
        let old = m.word_size();
        m.expand(offset, size)?;
        Ok((old, m.word_size()))
    })?;
    frame.consume_gas(memory_expansion_cost(old_words, new_words))
}

/// Copies a child's output into the caller region; already expanded at call time.
fn copy_output(frame: &CallFrame, offset: usize, size: usize, data: &Bytes) -> Result<(), VmError> {
    let len = size.min(data.len());
    frame.with_memory(|m| m.write_bytes(offset, &data.as_slice()[..len]))?;
    Ok(())
}

fn word_at(data: &[u8], offset: usize) -> Word {
    let mut bytes = [0u8; 32];
    if offset < data.len() {
        let available = (data.len() - offset).min(32);
        bytes[..available].copy_from_slice(&data[offset..offset + available]);
    }
    Word::from_big_endian(&bytes)
}

fn bool_word(value: bool) -> Word {
    if value {
        Word::one()
    } else {
        Word::zero()
    }
}

fn saturating_u64(value: Word) -> u64 {
    if value > Word::from(u64::MAX) {
        u64::MAX
    } else {
        value.as_u64()
    }
}

// =============================================================================
// TESTS
// =============================================================================
