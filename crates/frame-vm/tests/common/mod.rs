//! Shared helpers for call-tree integration tests.

#![allow(dead_code)]

use frame_vm::prelude::*;
use std::sync::Once;

pub const ORIGIN: Address = Address::from_low_u8(0xAA);
pub const CONTRACT_A: Address = Address::from_low_u8(0xA1);
pub const CONTRACT_B: Address = Address::from_low_u8(0xB1);
pub const CONTRACT_M: Address = Address::from_low_u8(0xD1);

static TRACING: Once = Once::new();

/// Installs a test subscriber once; `RUST_LOG` picks the level.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn context(world: WorldState) -> ExecutionContext {
    context_with(world, VmConfig::for_testing())
}

pub fn context_with(world: WorldState, config: VmConfig) -> ExecutionContext {
    init_tracing();
    ExecutionContext::with_world(TxnContext::new(ORIGIN, U256::one()), world, config)
}

/// Sends a transaction from `ORIGIN` to `to`, running the code deployed there.
pub fn transact(ctx: &mut ExecutionContext, to: Address, gas: u64) -> ExecutionOutcome {
    let code = ctx.world().code(&to).cloned().unwrap_or_default();
    let call = CallData::transaction(ORIGIN, to, U256::zero(), Bytes::new());
    let root = CallFrame::with_config(code, gas, &call, ctx.config());
    ctx.execute(root)
}

pub fn slot(ctx: &ExecutionContext, address: Address, key: u64) -> U256 {
    ctx.world().load(&address, &StorageKey::from(key))
}

// =============================================================================
// BYTECODE BUILDERS
// =============================================================================

/// PUSH20 `address`.
pub fn push_address(address: Address) -> Vec<u8> {
    let mut code = vec![0x73];
    code.extend_from_slice(address.as_bytes());
    code
}

/// CALL `to` with no value, no input, `gas` and a `ret_size`-byte output region at 0.
pub fn call(to: Address, gas: u16, ret_size: u8) -> Vec<u8> {
    let mut code = vec![
        0x60, ret_size, // retSize
        0x60, 0x00, // retOffset
        0x60, 0x00, // argsSize
        0x60, 0x00, // argsOffset
        0x60, 0x00, // value
    ];
    code.extend(push_address(to));
    code.extend([0x61, (gas >> 8) as u8, gas as u8, 0xF1]);
    code
}

/// STATICCALL `to` with no input and no output region.
pub fn static_call(to: Address, gas: u16) -> Vec<u8> {
    let mut code = vec![0x60, 0x00, 0x60, 0x00, 0x60, 0x00, 0x60, 0x00];
    code.extend(push_address(to));
    code.extend([0x61, (gas >> 8) as u8, gas as u8, 0xFA]);
    code
}

/// Stores the top of the stack at slot `key`.
pub fn store_top(key: u8) -> Vec<u8> {
    vec![0x60, key, 0x55]
}

/// PUSH1 `value` PUSH1 `key` SSTORE.
pub fn sstore(key: u8, value: u8) -> Vec<u8> {
    vec![0x60, value, 0x60, key, 0x55]
}

/// LOG0 over an empty memory region.
pub fn log0() -> Vec<u8> {
    vec![0x60, 0x00, 0x60, 0x00, 0xA0]
}

/// REVERT with empty output.
pub fn revert() -> Vec<u8> {
    vec![0x60, 0x00, 0x60, 0x00, 0xFD]
}

pub fn assemble(parts: &[Vec<u8>]) -> Bytes {
    Bytes::from_vec(parts.concat())
}
