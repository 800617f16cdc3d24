//! # Value Objects
//!
//! Immutable domain primitives for call-frame execution.
//! These types represent concepts that are defined by their value, not identity.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// Re-export U256 from primitive-types for 256-bit arithmetic
pub use primitive_types::U256;

/// Operand stack word.
pub type Word = U256;

// =============================================================================
// ADDRESS (20 bytes)
// =============================================================================

/// A 20-byte account address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// The zero address.
    pub const ZERO: Self = Self([0u8; 20]);

    /// Creates an address from a 20-byte array.
    #[must_use]
    pub const fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Creates an address from a slice. Returns None if wrong length.
    #[must_use]
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() == 20 {
            let mut bytes = [0u8; 20];
            bytes.copy_from_slice(slice);
            Some(Self(bytes))
        } else {
            None
        }
    }

    /// Address whose last byte is `n`; handy for fixtures.
    #[must_use]
    pub const fn from_low_u8(n: u8) -> Self {
        let mut bytes = [0u8; 20];
        bytes[19] = n;
        Self(bytes)
    }

    /// Takes the lower 20 bytes of a stack word.
    #[must_use]
    pub fn from_word(value: Word) -> Self {
        let mut bytes = [0u8; 32];
        value.to_big_endian(&mut bytes);
        let mut addr = [0u8; 20];
        addr.copy_from_slice(&bytes[12..32]);
        Self(addr)
    }

    /// Left-pads the address into a stack word.
    #[must_use]
    pub fn to_word(&self) -> Word {
        let mut bytes = [0u8; 32];
        bytes[12..].copy_from_slice(&self.0);
        Word::from_big_endian(&bytes)
    }

    /// Returns the underlying bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        for byte in &self.0[..4] {
            write!(f, "{byte:02x}")?;
        }
        write!(f, "...")?;
        for byte in &self.0[18..] {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

// =============================================================================
// STORAGE KEY (32 bytes)
// =============================================================================

/// A 32-byte storage slot key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct StorageKey(pub [u8; 32]);

impl StorageKey {
    /// Creates a storage key from a U256.
    #[must_use]
    pub fn from_u256(value: U256) -> Self {
        let mut bytes = [0u8; 32];
        value.to_big_endian(&mut bytes);
        Self(bytes)
    }

    /// Converts back to a stack word.
    #[must_use]
    pub fn to_u256(&self) -> U256 {
        U256::from_big_endian(&self.0)
    }
}

impl fmt::Debug for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageKey({})", self.to_u256())
    }
}

impl From<U256> for StorageKey {
    fn from(value: U256) -> Self {
        Self::from_u256(value)
    }
}

impl From<u64> for StorageKey {
    fn from(value: u64) -> Self {
        Self::from_u256(U256::from(value))
    }
}

// =============================================================================
// BYTES (variable length)
// =============================================================================

/// Variable-length byte vector for calldata, return data, and code.
#[derive(Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Bytes(pub Vec<u8>);

impl Bytes {
    /// Creates an empty Bytes.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Creates Bytes from a vector.
    #[must_use]
    pub fn from_vec(vec: Vec<u8>) -> Self {
        Self(vec)
    }

    /// Creates Bytes from a slice.
    #[must_use]
    pub fn from_slice(slice: &[u8]) -> Self {
        Self(slice.to_vec())
    }

    /// Returns a reference to the underlying slice.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Returns the length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Bytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x")?;
        if self.0.len() <= 8 {
            for byte in &self.0 {
                write!(f, "{byte:02x}")?;
            }
        } else {
            for byte in &self.0[..4] {
                write!(f, "{byte:02x}")?;
            }
            write!(f, "..({} bytes)", self.0.len())?;
        }
        Ok(())
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(vec: Vec<u8>) -> Self {
        Self(vec)
    }
}

impl From<&[u8]> for Bytes {
    fn from(slice: &[u8]) -> Self {
        Self(slice.to_vec())
    }
}

// =============================================================================
// FRAME ID
// =============================================================================

/// Opaque per-frame diagnostic token.
///
/// Only used to correlate log lines; frames are never compared by id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameId(Uuid);

impl FrameId {
    /// Generates a fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FrameId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

// =============================================================================
// TESTS
// =============================================================================
