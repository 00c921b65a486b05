//! Key-value store trait definition.

use crate::batch::{WriteBatch, WriteOptions};
use crate::error::StorageResult;
use crate::snapshot::Snapshot;

/// Iterator over `(key, value)` pairs in ascending key order.
pub type KvIter = Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + Send>;

/// An ordered key-value store.
///
/// Stores are **trusted primitives**: the recovery unit relies on them for
/// atomic batch application and snapshot consistency and does not try to
/// repair a store that breaks these guarantees.
///
/// # Invariants
///
/// - `write` applies every operation of the batch or none of them
/// - A read scoped to a snapshot never observes a batch applied after the
///   snapshot was taken
/// - Reads without a snapshot observe the latest applied state
/// - Stores must be `Send + Sync`; they are shared by every recovery unit
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing and ephemeral use
pub trait KvStore: Send + Sync {
    /// Point lookup.
    ///
    /// Returns `None` if the key does not exist in the selected view.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn get(&self, key: &[u8], snapshot: Option<&Snapshot>) -> StorageResult<Option<Vec<u8>>>;

    /// Returns an iterator over all live keys in ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn iter(&self, snapshot: Option<&Snapshot>) -> StorageResult<KvIter>;

    /// Applies `batch` atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the batch was rejected. A rejected batch must
    /// leave the store untouched.
    fn write(&self, batch: &WriteBatch, options: WriteOptions) -> StorageResult<()>;

    /// Captures a consistent read view of the current state.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be allocated.
    fn snapshot(&self) -> StorageResult<Snapshot>;

    /// Releases a snapshot previously returned by [`KvStore::snapshot`].
    fn release_snapshot(&self, snapshot: Snapshot) {
        drop(snapshot);
    }

    /// Makes every batch applied so far durable, including those written
    /// with [`WriteOptions::disable_wal`].
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    fn flush_wal(&self) -> StorageResult<()>;
}
