//! Write-conflict tracking.
//!
//! Every recovery unit owns one transaction in a shared [`ConflictTracker`].
//! The recovery unit drives four points of the tracker's protocol:
//! - **begin** when the unit is created
//! - **record snapshot id** right before it captures its first snapshot
//! - **commit** after its write batch has been applied to the store
//! - **abort** whenever buffered work is discarded
//!
//! Writes are registered as they are buffered, so a conflicting write fails
//! immediately with a retryable [`CoreError::WriteConflict`](crate::CoreError).

mod engine;

pub use engine::TransactionEngine;

use crate::error::CoreResult;
use crate::types::{SequenceNumber, TransactionId};

/// Assigns ordering tokens to transactions and detects write-write conflicts.
///
/// Trackers are shared by every recovery unit of an engine and must be safe
/// for concurrent use.
pub trait ConflictTracker: Send + Sync {
    /// Starts tracking a new transaction.
    fn begin(&self) -> TransactionId;

    /// Records the transaction's position in the commit order.
    ///
    /// Must be called before the transaction captures its read snapshot.
    fn record_snapshot_id(&self, txn: TransactionId) -> SequenceNumber;

    /// Claims `key` for the transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::WriteConflict`](crate::CoreError::WriteConflict)
    /// if another transaction holds an uncommitted write on the key or
    /// committed it after this transaction's snapshot id.
    fn register_write(&self, txn: TransactionId, key: &[u8]) -> CoreResult<()>;

    /// Publishes the transaction's writes in the commit order.
    ///
    /// Must be called only after the writes are applied to the store.
    fn commit(&self, txn: TransactionId) -> SequenceNumber;

    /// Releases every claim held by the transaction.
    fn abort(&self, txn: TransactionId);
}
