//! # Call Return Buffer
//!
//! Single slot holding the outcome of the child call that just finished,
//! until the parent frame consumes it.

use crate::domain::value_objects::Bytes;

/// Staged child outcome.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum StagedResult {
    /// Nothing staged.
    #[default]
    Empty,
    /// Child returned normally.
    Returned {
        /// Caller memory offset the data is destined for.
        offset: usize,
        /// Size of the caller memory region.
        size: usize,
        /// Returned bytes.
        data: Bytes,
    },
    /// Child reverted.
    Reverted {
        /// Human-readable reason.
        reason: String,
        /// Revert payload, if any.
        data: Bytes,
    },
}

/// Return buffer of a frame. The last write wins.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CallReturnBuffer {
    slot: StagedResult,
}

impl CallReturnBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stages a normal return.
    pub fn cache_return(&mut self, offset: usize, size: usize, data: Bytes) {
        self.slot = StagedResult::Returned { offset, size, data };
    }

    /// Stages a revert, superseding anything pending.
    pub fn cache_reverted(&mut self, reason: impl Into<String>) {
        self.cache_reverted_output(reason, Bytes::new());
    }

    /// Stages a revert together with its payload.
    pub fn cache_reverted_output(&mut self, reason: impl Into<String>, data: Bytes) {
        self.slot = StagedResult::Reverted {
            reason: reason.into(),
            data,
        };
    }

    /// Current staged value.
    #[must_use]
    pub fn staged(&self) -> &StagedResult {
        &self.slot
    }

    /// Returns true if nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slot == StagedResult::Empty
    }

    /// Returns true if a revert is staged.
    #[must_use]
    pub fn is_reverted(&self) -> bool {
        matches!(self.slot, StagedResult::Reverted { .. })
    }

    /// Staged revert reason, if any.
    #[must_use]
    pub fn revert_reason(&self) -> Option<&str> {
        match &self.slot {
            StagedResult::Reverted { reason, .. } => Some(reason),
            _ => None,
        }
    }

    /// Removes and returns the staged value.
    pub fn take(&mut self) -> StagedResult {
        std::mem::take(&mut self.slot)
    }
}

// =============================================================================
// TESTS
// =============================================================================
