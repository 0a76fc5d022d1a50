//! Error types for the core library.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur in core operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Persistence failed. Transient failures may be retried by the caller.
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Caller supplied an unusable value (empty identifier, non-positive duration).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A retention window is already counting down for this identifier.
    #[error("Retention already set for {identifier} (unblocks at {unblock_at})")]
    RetentionAlreadySet {
        /// Identifier whose countdown is pending.
        identifier: String,
        /// The pending unblock instant, left unchanged.
        unblock_at: DateTime<Utc>,
    },

    /// A raw insert hit an identifier that is already stored.
    #[error("Identifier already stored: {0}")]
    DuplicateKey(String),
}

impl Error {
    /// Returns true if the error came from the persistence layer.
    #[must_use]
    pub const fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
