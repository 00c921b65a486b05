//! Error types for storage operations.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The store refused to apply a write batch. Nothing from the batch was applied.
    #[error("write batch rejected: {0}")]
    WriteRejected(String),

    /// The store was closed; no further reads, writes or snapshots are served.
    #[error("storage is closed")]
    Closed,
}
