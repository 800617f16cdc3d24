//! # Opcodes
//!
//! Byte-to-operation lookup for the dispatcher. Byte values follow the EVM
//! encoding; `CALLF`/`RETF` are the jump-based internal call pair.

use std::collections::HashSet;

/// Decoded instruction.
///
/// `Unknown` is the sentinel returned for bytes outside the instruction set
/// and for reads past the end of code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Opcode {
    // 0x00 - Stop and Arithmetic
    Stop,
    Add,
    Mul,
    Sub,

    // 0x10 - Comparison
    Lt,
    Gt,
    Eq,
    IsZero,

    // 0x30 - Call environment
    Caller,
    CallValue,
    CallDataLoad,
    CallDataSize,
    ReturnDataSize,
    ReturnDataCopy,

    // 0x50 - Stack, Memory, Storage, Flow
    Pop,
    MLoad,
    MStore,
    MStore8,
    SLoad,
    SStore,
    Jump,
    JumpI,
    Pc,
    MSize,
    Gas,
    JumpDest,

    /// PUSH0..PUSH32; payload is the immediate size in bytes.
    Push(u8),
    /// DUP1..DUP16; payload is the 1-based depth.
    Dup(u8),
    /// SWAP1..SWAP16; payload is the 1-based depth.
    Swap(u8),
    /// LOG0..LOG4; payload is the topic count.
    Log(u8),

    // 0xE3 - Internal calls
    CallF,
    RetF,

    // 0xF0 - System
    Create,
    Call,
    Return,
    StaticCall,
    Revert,
    Invalid,

    /// Not an instruction.
    Unknown,
}

impl Opcode {
    /// Decode a byte. Never fails; undefined bytes map to `Unknown`.
    #[must_use]
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0x00 => Self::Stop,
            0x01 => Self::Add,
            0x02 => Self::Mul,
            0x03 => Self::Sub,

            0x10 => Self::Lt,
            0x11 => Self::Gt,
            0x14 => Self::Eq,
            0x15 => Self::IsZero,

            0x33 => Self::Caller,
            0x34 => Self::CallValue,
            0x35 => Self::CallDataLoad,
            0x36 => Self::CallDataSize,
            0x3D => Self::ReturnDataSize,
            0x3E => Self::ReturnDataCopy,

            0x50 => Self::Pop,
            0x51 => Self::MLoad,
            0x52 => Self::MStore,
            0x53 => Self::MStore8,
            0x54 => Self::SLoad,
            0x55 => Self::SStore,
            0x56 => Self::Jump,
            0x57 => Self::JumpI,
            0x58 => Self::Pc,
            0x59 => Self::MSize,
            0x5A => Self::Gas,
            0x5B => Self::JumpDest,

            0x5F..=0x7F => Self::Push(byte - 0x5F),
            0x80..=0x8F => Self::Dup(byte - 0x7F),
            0x90..=0x9F => Self::Swap(byte - 0x8F),
            0xA0..=0xA4 => Self::Log(byte - 0xA0),

            0xE3 => Self::CallF,
            0xE4 => Self::RetF,

            0xF0 => Self::Create,
            0xF1 => Self::Call,
            0xF3 => Self::Return,
            0xFA => Self::StaticCall,
            0xFD => Self::Revert,
            0xFE => Self::Invalid,

            _ => Self::Unknown,
        }
    }

    /// Number of immediate bytes following the opcode.
    #[must_use]
    pub fn immediate_size(&self) -> usize {
        match self {
            Self::Push(n) => usize::from(*n),
            _ => 0,
        }
    }

    /// Returns true if this opcode ends the current frame.
    #[must_use]
    pub fn is_terminating(&self) -> bool {
        matches!(
            self,
            Self::Stop | Self::Return | Self::Revert | Self::Invalid | Self::RetF
        )
    }

    /// Returns true if this opcode opens a child frame.
    #[must_use]
    pub fn is_call(&self) -> bool {
        matches!(
            self,
            Self::CallF | Self::Call | Self::StaticCall | Self::Create
        )
    }

    /// Returns true if this opcode is forbidden in a static frame.
    ///
    /// `CALL` is only forbidden when it carries value, which the dispatcher
    /// checks after popping its operands.
    #[must_use]
    pub fn is_state_modifying(&self) -> bool {
        matches!(self, Self::SStore | Self::Log(_) | Self::Create)
    }
}

/// Finds valid `JUMPDEST` offsets, skipping PUSH immediates.
#[must_use]
pub fn jump_destinations(code: &[u8]) -> HashSet<usize> {
    let mut dests = HashSet::new();
    let mut i = 0;

    while i < code.len() {
        let op = Opcode::from_byte(code[i]);
        if op == Opcode::JumpDest {
            dests.insert(i);
        }
        i += 1 + op.immediate_size();
    }

    dests
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_from_byte() {
        assert_eq!(Opcode::from_byte(0x00), Opcode::Stop);
        assert_eq!(Opcode::from_byte(0x01), Opcode::Add);
        assert_eq!(Opcode::from_byte(0x5F), Opcode::Push(0));
        assert_eq!(Opcode::from_byte(0x60), Opcode::Push(1));
        assert_eq!(Opcode::from_byte(0x7F), Opcode::Push(32));
        assert_eq!(Opcode::from_byte(0x80), Opcode::Dup(1));
        assert_eq!(Opcode::from_byte(0x9F), Opcode::Swap(16));
        assert_eq!(Opcode::from_byte(0xA4), Opcode::Log(4));
        assert_eq!(Opcode::from_byte(0xE3), Opcode::CallF);
        assert_eq!(Opcode::from_byte(0xF1), Opcode::Call);
        assert_eq!(Opcode::from_byte(0x0C), Opcode::Unknown);
    }

    #[test]
    fn test_immediate_size() {
        assert_eq!(Opcode::Push(0).immediate_size(), 0);
        assert_eq!(Opcode::Push(1).immediate_size(), 1);
        assert_eq!(Opcode::Push(32).immediate_size(), 32);
        assert_eq!(Opcode::Add.immediate_size(), 0);
    }

    #[test]
    fn test_is_terminating() {
        assert!(Opcode::Stop.is_terminating());
        assert!(Opcode::Return.is_terminating());
        assert!(Opcode::RetF.is_terminating());
        assert!(!Opcode::Add.is_terminating());
    }

    #[test]
    fn test_jump_destinations() {
        // PUSH1 0x5B JUMPDEST STOP: the pushed 0x5B is data, not a destination
        let dests = jump_destinations(&[0x60, 0x5B, 0x5B, 0x00]);
        assert!(dests.contains(&2));
        assert!(!dests.contains(&1));
        assert_eq!(dests.len(), 1);
    }

    #[test]
    fn test_is_state_modifying() {
        assert!(Opcode::SStore.is_state_modifying());
        assert!(Opcode::Create.is_state_modifying());
        assert!(Opcode::Log(0).is_state_modifying());
        assert!(!Opcode::SLoad.is_state_modifying());
        assert!(!Opcode::Call.is_state_modifying());
    }
}
