//! # Frame Scenarios
//!
//! The frame-level contract observed through the public API, without the
//! interpreter: gas exhaustion, internal frames sharing the parent's stack,
//! return-buffer precedence and log merging.

mod common;

use common::*;
use frame_vm::prelude::*;

fn root_call() -> CallData {
    CallData::transaction(ORIGIN, CONTRACT_A, U256::zero(), Bytes::new())
}

#[test]
fn test_exhausting_gas_exactly_then_one_more() {
    init_tracing();
    let mut frame = CallFrame::new(Bytes::new(), 21_000, &root_call());

    assert_eq!(frame.consume_gas(21_000), Ok(()));
    assert_eq!(frame.gas_remaining(), 0);
    assert_eq!(frame.gas_used(), 21_000);

    assert_eq!(frame.consume_gas(1), Err(VmError::OutOfGas));
    assert_eq!(frame.gas_remaining(), 0);
    assert_eq!(frame.gas_used(), 21_000);
}

#[test]
fn test_internal_frame_pops_parent_values() {
    let mut ctx = context(WorldState::new());
    let root =
        CallFrame::with_config(Bytes::from_slice(&[0x5B]), 50_000, &root_call(), ctx.config());
    ctx.push_frame(root).unwrap();
    ctx.current_frame().unwrap().push(U256::from(3)).unwrap();
    ctx.current_frame().unwrap().push(U256::from(4)).unwrap();

    let internal = CallFrame::internal(&ctx, 0, 10_000).unwrap();
    assert_eq!(internal.call_type(), CallType::Internal);
    assert_eq!(internal.pc(), 0);
    assert_eq!(internal.gas_remaining(), 10_000);
    assert!(internal.stack().ptr_eq(ctx.current_frame().unwrap().stack()));

    assert_eq!(internal.pop().unwrap(), U256::from(4));
    assert_eq!(internal.pop().unwrap(), U256::from(3));
    assert_eq!(
        ctx.current_frame().unwrap().pop(),
        Err(VmError::StackUnderflow)
    );
}

#[test]
fn test_revert_record_supersedes_pending_return() {
    init_tracing();
    let mut frame = CallFrame::new(Bytes::new(), 1000, &root_call());

    frame.cache_return(0, 32, Bytes::from_vec(vec![0xAB; 32]));
    frame.cache_reverted("insufficient balance");

    assert!(frame.return_buffer().is_reverted());
    assert_eq!(
        frame.return_buffer().revert_reason(),
        Some("insufficient balance")
    );
    match frame.take_staged() {
        StagedResult::Reverted { reason, data } => {
            assert_eq!(reason, "insufficient balance");
            assert!(data.is_empty());
        }
        other => panic!("unexpected staged result: {other:?}"),
    }
}

#[test]
fn test_absent_or_empty_log_batches_change_nothing() {
    init_tracing();
    let mut frame = CallFrame::new(Bytes::new(), 1000, &root_call());
    let entry = LogEntry::new(CONTRACT_A, vec![U256::one()], Bytes::from_slice(&[0x01]));
    frame.add_log(entry.clone());

    frame.add_logs(None);
    frame.add_logs(Some(Vec::new()));

    assert_eq!(frame.logs(), &[entry]);
}
