//! Error types for actlog core.

use actlog_codec::describe;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in actlog core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] actlog_storage::StorageError),

    /// Key or record codec error.
    #[error("codec error: {0}")]
    Codec(#[from] actlog_codec::CodecError),

    /// The addressed entry does not exist.
    #[error("not found: kind {kind:?} key {key}")]
    NotFound {
        /// Kind of the missing entry.
        kind: String,
        /// Human-readable rendering of the missing key.
        key: String,
    },

    /// A stored composite key or record could not be interpreted.
    #[error("decode error: {message}")]
    Decode {
        /// Description of the malformed data.
        message: String,
    },

    /// The operation is not valid in the entry's current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of the invalid operation.
        message: String,
    },

    /// No executor is registered for an entry kind.
    #[error("no executor registered for kind {kind:?}")]
    ExecutorNotRegistered {
        /// The entry kind.
        kind: String,
    },
}

impl CoreError {
    /// Creates a not-found error for an entry.
    pub fn not_found(kind: impl Into<String>, key: &[u8]) -> Self {
        Self::NotFound {
            kind: kind.into(),
            key: describe(key),
        }
    }

    /// Creates a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true if this is a not-found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
