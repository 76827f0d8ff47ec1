//! Error types for the index.

use crate::types::PageNumber;
use thiserror::Error;

/// Result type alias for tree operations
pub type Result<T> = std::result::Result<T, TreeError>;

/// Errors that can occur in the index
#[derive(Error, Debug)]
pub enum TreeError {
    /// Malformed byte format: unknown marker or role, page size out of range
    #[error("bad page: {0}")]
    BadPage(String),

    /// Entry exceeds the per-page or absolute length cap
    #[error("entry too long: {size} bytes (max: {max})")]
    EntryTooLong { size: usize, max: usize },

    /// A page required by a write operation is unavailable.
    ///
    /// Read-side queries never produce this error; they report missing pages
    /// as distinct values instead.
    #[error("page {0} unavailable")]
    PageUnavailable(PageNumber),

    /// Structural invariant violated, reported by the explicit integrity check
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    /// Impossible-if-correct internal state (e.g. counts mismatched after a split)
    #[error("corruption detected: {0}")]
    Corruption(String),
}

impl TreeError {
    /// Create a bad-page error with a message
    pub fn bad_page(msg: impl Into<String>) -> Self {
        Self::BadPage(msg.into())
    }

    /// Create a corruption error with a message
    pub fn corruption(msg: impl Into<String>) -> Self {
        Self::Corruption(msg.into())
    }

    /// Create an integrity-violation error with a message
    pub fn integrity(msg: impl Into<String>) -> Self {
        Self::IntegrityViolation(msg.into())
    }
}
