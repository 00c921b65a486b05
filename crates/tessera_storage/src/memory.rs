//! In-memory multi-version store.

use crate::batch::{BatchOp, WriteBatch, WriteOptions};
use crate::error::{StorageError, StorageResult};
use crate::snapshot::{Snapshot, SnapshotList};
use crate::store::{KvIter, KvStore};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One version of a key: the sequence that wrote it and the value, or `None`
/// for a tombstone. Versions are kept in ascending sequence order.
type Version = (u64, Option<Vec<u8>>);

/// Write counters exposed for tests and diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Batches applied with the WAL enabled.
    pub logged_batches: u64,
    /// Batches applied with the WAL disabled.
    pub unlogged_batches: u64,
    /// Unlogged batches not yet covered by a WAL flush.
    pub pending_unlogged: u64,
    /// Number of WAL flushes.
    pub wal_flushes: u64,
    /// Sequence number of the last applied batch.
    pub last_sequence: u64,
}

#[derive(Debug, Default)]
struct Inner {
    data: BTreeMap<Vec<u8>, Vec<Version>>,
    stats: StoreStats,
    fail_next_write: Option<String>,
    closed: bool,
}

impl Inner {
    fn ensure_open(&self) -> StorageResult<()> {
        if self.closed {
            return Err(StorageError::Closed);
        }
        Ok(())
    }
}

/// An in-memory MVCC key-value store.
///
/// Every applied batch receives the next sequence number and each key keeps
/// the versions still reachable from a live [`Snapshot`]. This store is
/// suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral databases that don't need persistence
///
/// # Thread Safety
///
/// This store is thread-safe and is meant to be shared behind an `Arc`.
///
/// # Example
///
/// ```rust
/// use tessera_storage::{InMemoryStore, KvStore, WriteBatch, WriteOptions};
///
/// let store = InMemoryStore::new();
/// let before = store.snapshot().unwrap();
///
/// let mut batch = WriteBatch::new();
/// batch.put(b"k".to_vec(), b"v".to_vec());
/// store.write(&batch, WriteOptions::default()).unwrap();
///
/// assert_eq!(store.get(b"k", Some(&before)).unwrap(), None);
/// assert_eq!(store.get(b"k", None).unwrap(), Some(b"v".to_vec()));
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
    snapshots: Arc<SnapshotList>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live snapshot handles.
    #[must_use]
    pub fn live_snapshots(&self) -> usize {
        self.snapshots.len()
    }

    /// Returns a copy of the write counters.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        self.inner.read().stats
    }

    /// Makes the next call to [`KvStore::write`] reject its batch.
    ///
    /// Used to exercise the fatal commit path.
    pub fn fail_next_write(&self, reason: impl Into<String>) {
        self.inner.write().fail_next_write = Some(reason.into());
    }

    /// Closes the store. Every later call except snapshot release fails with
    /// [`StorageError::Closed`]; live snapshots stay valid handles.
    pub fn close(&self) {
        self.inner.write().closed = true;
        tracing::debug!(live_snapshots = self.snapshots.len(), "store closed");
    }

    /// Returns true once [`InMemoryStore::close`] was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.read().closed
    }

    /// Returns the number of keys with at least one stored version.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.inner.read().data.len()
    }

    fn read_sequence(&self, inner: &Inner, snapshot: Option<&Snapshot>) -> u64 {
        snapshot.map_or(inner.stats.last_sequence, Snapshot::sequence)
    }
}

/// Returns the value visible at `sequence`, if any.
fn visible(versions: &[Version], sequence: u64) -> Option<&Vec<u8>> {
    versions
        .iter()
        .rev()
        .find(|(seq, _)| *seq <= sequence)
        .and_then(|(_, value)| value.as_ref())
}

/// Drops versions no reader can reach any more.
///
/// Keeps the newest version at or below `horizon` plus everything newer.
/// Returns true if the key has nothing left worth keeping.
fn prune(versions: &mut Vec<Version>, horizon: u64) -> bool {
    if let Some(base) = versions.iter().rposition(|(seq, _)| *seq <= horizon) {
        versions.drain(..base);
    }
    matches!(versions.as_slice(), [(seq, None)] if *seq <= horizon)
}

impl KvStore for InMemoryStore {
    fn get(&self, key: &[u8], snapshot: Option<&Snapshot>) -> StorageResult<Option<Vec<u8>>> {
        let inner = self.inner.read();
        inner.ensure_open()?;
        let sequence = self.read_sequence(&inner, snapshot);
        Ok(inner
            .data
            .get(key)
            .and_then(|versions| visible(versions, sequence))
            .cloned())
    }

    fn iter(&self, snapshot: Option<&Snapshot>) -> StorageResult<KvIter> {
        let inner = self.inner.read();
        inner.ensure_open()?;
        let sequence = self.read_sequence(&inner, snapshot);
        let entries: Vec<(Vec<u8>, Vec<u8>)> = inner
            .data
            .iter()
            .filter_map(|(key, versions)| {
                visible(versions, sequence).map(|value| (key.clone(), value.clone()))
            })
            .collect();
        Ok(Box::new(entries.into_iter()))
    }

    fn write(&self, batch: &WriteBatch, options: WriteOptions) -> StorageResult<()> {
        let mut inner = self.inner.write();
        inner.ensure_open()?;

        if let Some(reason) = inner.fail_next_write.take() {
            tracing::warn!(reason = %reason, ops = batch.count(), "rejecting write batch");
            return Err(StorageError::WriteRejected(reason));
        }

        if batch.is_empty() {
            return Ok(());
        }

        let sequence = inner.stats.last_sequence + 1;
        for op in batch.iter() {
            let (key, value) = match op {
                BatchOp::Put { key, value } => (key, Some(value.clone())),
                BatchOp::Delete { key } => (key, None),
            };
            let versions = inner.data.entry(key.clone()).or_default();
            match versions.last_mut() {
                // Same key twice in one batch: last operation wins.
                Some(last) if last.0 == sequence => last.1 = value,
                _ => versions.push((sequence, value)),
            }
        }

        let horizon = self.snapshots.oldest().unwrap_or(sequence);
        for op in batch.iter() {
            let drained = inner
                .data
                .get_mut(op.key())
                .is_some_and(|versions| prune(versions, horizon));
            if drained {
                inner.data.remove(op.key());
            }
        }

        let stats = &mut inner.stats;
        stats.last_sequence = sequence;
        if options.disable_wal {
            stats.unlogged_batches += 1;
            stats.pending_unlogged += 1;
        } else {
            stats.logged_batches += 1;
        }
        Ok(())
    }

    fn snapshot(&self) -> StorageResult<Snapshot> {
        let inner = self.inner.read();
        inner.ensure_open()?;
        Ok(self.snapshots.acquire(inner.stats.last_sequence))
    }

    fn flush_wal(&self) -> StorageResult<()> {
        let mut inner = self.inner.write();
        inner.ensure_open()?;
        inner.stats.pending_unlogged = 0;
        inner.stats.wal_flushes += 1;
        Ok(())
    }
}
