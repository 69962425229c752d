//! Error types for storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The journal is corrupted somewhere other than its tail.
    #[error("journal corrupted at offset {offset}: {message}")]
    Corrupted {
        /// Byte offset of the bad record.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// Another process holds the store lock.
    #[error("store locked: another process has exclusive access")]
    Locked,

    /// The store directory does not exist and creation was not requested.
    #[error("store not found: {path}")]
    NotFound {
        /// The missing directory.
        path: String,
    },

    /// A single value or key exceeds the journal's length field.
    #[error("record too large: {len} bytes")]
    TooLarge {
        /// Size of the offending key or value.
        len: usize,
    },
}

impl StorageError {
    /// Creates a corruption error.
    pub fn corrupted(offset: u64, message: impl Into<String>) -> Self {
        Self::Corrupted {
            offset,
            message: message.into(),
        }
    }

    /// Returns true if the failure may go away when the operation is retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Io(_) | StorageError::Locked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors() {
        let io = StorageError::Io(io::Error::new(io::ErrorKind::Interrupted, "eintr"));
        assert!(io.is_transient());
        assert!(StorageError::Locked.is_transient());
        assert!(!StorageError::corrupted(12, "bad crc").is_transient());
    }

    #[test]
    fn corrupted_display() {
        let err = StorageError::corrupted(42, "bad crc");
        assert_eq!(err.to_string(), "journal corrupted at offset 42: bad crc");
    }
}
