//! Error types for the sync pipeline.

use actlog_core::CoreError;
use actlog_storage::StorageError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The transform reported a failure. Outputs it did return were applied.
    #[error("transform failed after {applied} outputs: {message}")]
    Transform {
        /// Error message from the transform.
        message: String,
        /// Number of outputs applied before the error was returned.
        applied: usize,
    },

    /// The transform returned a different number of outputs than inputs.
    #[error("transform returned {outputs} outputs for {inputs} inputs")]
    CountMismatch {
        /// Items sent to the transform.
        inputs: usize,
        /// Outputs received.
        outputs: usize,
    },

    /// Sync was cancelled.
    #[error("sync cancelled")]
    Cancelled,

    /// Error from the log, watcher, or store.
    #[error("core error: {0}")]
    Core(#[from] CoreError),
}

impl SyncError {
    /// Creates a transform error.
    pub fn transform(message: impl Into<String>, applied: usize) -> Self {
        Self::Transform {
            message: message.into(),
            applied,
        }
    }

    /// Returns true if re-running the sync may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transform { .. } | SyncError::CountMismatch { .. } => true,
            SyncError::Core(CoreError::Storage(e)) => e.is_transient(),
            _ => false,
        }
    }
}

impl From<StorageError> for SyncError {
    fn from(e: StorageError) -> Self {
        SyncError::Core(CoreError::Storage(e))
    }
}
