//! Error types for Tessera core.

use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in recovery unit operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage error that does not threaten store integrity.
    #[error("storage error: {0}")]
    Storage(#[from] tessera_storage::StorageError),

    /// Another unit of work wrote the same key concurrently.
    ///
    /// The whole unit of work should be aborted and retried.
    #[error("write conflict on key {key:?}")]
    WriteConflict {
        /// The contended key.
        key: Vec<u8>,
    },

    /// Operation not permitted in the current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// A persisted counter does not have the fixed counter width.
    #[error("corrupt counter at key {key:?}: expected 8 bytes, got {len}")]
    CorruptCounter {
        /// The counter key.
        key: Vec<u8>,
        /// Length of the stored value.
        len: usize,
    },

    /// The operation context holds a different kind of recovery unit.
    #[error("recovery unit mismatch: expected {expected}, found {found}")]
    RecoveryUnitMismatch {
        /// Kind the caller asked for.
        expected: &'static str,
        /// Kind the context actually holds.
        found: &'static str,
    },
}

impl CoreError {
    /// Creates a write conflict error.
    pub fn write_conflict(key: impl Into<Vec<u8>>) -> Self {
        Self::WriteConflict { key: key.into() }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Returns true if retrying the whole unit of work may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::WriteConflict { .. })
    }
}

/// A failed atomic batch application.
///
/// This is not a [`CoreError`]: once the store rejects a commit batch the
/// all-or-nothing durability guarantee can no longer be trusted, so it is
/// handed to the configured [`FaultHandler`](crate::FaultHandler) instead of
/// being returned to the caller.
#[derive(Debug, Error)]
#[error("unrecoverable storage fault in {operation} ({ops} ops): {source}")]
pub struct StorageFault {
    /// Operation that was being performed.
    pub operation: &'static str,
    /// Number of operations in the rejected batch.
    pub ops: usize,
    /// The store's error.
    #[source]
    pub source: tessera_storage::StorageError,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_storage::StorageError;

    #[test]
    fn only_write_conflicts_are_retryable() {
        assert!(CoreError::write_conflict(b"k".to_vec()).is_retryable());
        assert!(!CoreError::invalid_operation("nope").is_retryable());
        assert!(!CoreError::Storage(StorageError::Closed).is_retryable());
    }

    #[test]
    fn fault_display_names_operation() {
        let fault = StorageFault {
            operation: "commit",
            ops: 3,
            source: StorageError::WriteRejected("disk full".into()),
        };
        let text = fault.to_string();
        assert!(text.contains("commit"));
        assert!(text.contains("disk full"));
    }
}
