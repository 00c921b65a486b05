//! Recovery unit over an ordered key-value store.

use crate::change::{Change, ChangeList};
use crate::config::{Config, FaultHandler};
use crate::context::OperationContext;
use crate::counter::{Counter, CounterDeltas};
use crate::error::{CoreError, CoreResult, StorageFault};
use crate::recovery_unit::RecoveryUnit;
use crate::transaction::ConflictTracker;
use crate::types::{RecordId, TransactionId};
use crate::write_buffer::{BufferLookup, OverlayIter, WriteBuffer};
use std::fmt;
use std::sync::Arc;
use tessera_storage::{KvIter, KvStore, Snapshot, WriteOptions};
use tracing::{debug, error, trace};

/// Recovery unit that buffers writes for a [`KvStore`] and tracks conflicts
/// through a [`ConflictTracker`].
///
/// A unit is owned by a single operation and is not internally synchronized.
/// The store and the tracker are shared with every other unit.
///
/// ## Ordering
///
/// Two orderings make snapshot reads and conflict detection agree:
/// - the snapshot id is recorded with the tracker before the store snapshot
///   is captured
/// - the tracker learns about a commit only after the batch is in the store
///
/// A concurrent commit that lands between the two steps of either pair is
/// then reported as newer than this unit's snapshot, which errs on the side
/// of a spurious conflict rather than a missed one.
pub struct KvRecoveryUnit {
    store: Arc<dyn KvStore>,
    tracker: Arc<dyn ConflictTracker>,
    txn: TransactionId,
    durable: bool,
    fault_handler: FaultHandler,
    depth: u32,
    write_buffer: Option<WriteBuffer>,
    snapshot: Option<Snapshot>,
    changes: ChangeList,
    counters: CounterDeltas,
    oplog_read_till: Option<RecordId>,
}

impl KvRecoveryUnit {
    /// Name reported by [`RecoveryUnit::kind`].
    pub const KIND: &'static str = "kv";

    /// Creates a unit and begins its transaction with the tracker.
    pub fn new(
        store: Arc<dyn KvStore>,
        tracker: Arc<dyn ConflictTracker>,
        config: &Config,
    ) -> Self {
        let txn = tracker.begin();
        Self {
            store,
            tracker,
            txn,
            durable: config.durable,
            fault_handler: config.fault_handler,
            depth: 0,
            write_buffer: None,
            snapshot: None,
            changes: ChangeList::new(),
            counters: CounterDeltas::new(),
            oplog_read_till: None,
        }
    }

    /// Returns the unit held by `ctx`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::RecoveryUnitMismatch`] if the context holds a
    /// different kind of recovery unit.
    pub fn from_context(ctx: &mut OperationContext) -> CoreResult<&mut Self> {
        let found = ctx.recovery_unit().kind();
        ctx.recovery_unit_mut()
            .as_kv_mut()
            .ok_or(CoreError::RecoveryUnitMismatch {
                expected: Self::KIND,
                found,
            })
    }

    /// Transaction id assigned by the tracker.
    #[must_use]
    pub fn transaction_id(&self) -> TransactionId {
        self.txn
    }

    /// Number of open units of work.
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Returns true if commits go through the WAL.
    #[must_use]
    pub fn is_durable(&self) -> bool {
        self.durable
    }

    /// Returns true if a snapshot is currently held.
    #[must_use]
    pub fn has_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }

    /// Number of operations buffered since the last commit or abort.
    #[must_use]
    pub fn pending_ops(&self) -> usize {
        self.write_buffer.as_ref().map_or(0, WriteBuffer::op_count)
    }

    /// Number of changes waiting for the unit of work to finish.
    #[must_use]
    pub fn pending_changes(&self) -> usize {
        self.changes.len()
    }

    /// Advisory oplog visibility marker.
    #[must_use]
    pub fn oplog_read_till(&self) -> Option<RecordId> {
        self.oplog_read_till
    }

    /// Returns the unit's snapshot, capturing it on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot allocate a snapshot.
    pub fn snapshot(&mut self) -> CoreResult<&Snapshot> {
        self.ensure_snapshot()?;
        self.snapshot
            .as_ref()
            .ok_or_else(|| CoreError::invalid_operation("snapshot missing after capture"))
    }

    /// Reads `key`, seeing this unit's own pending writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn get(&mut self, key: &[u8]) -> CoreResult<Option<Vec<u8>>> {
        if let Some(buffer) = self.write_buffer.as_ref().filter(|b| !b.is_empty()) {
            match buffer.lookup(key) {
                BufferLookup::Value(value) => return Ok(Some(value.to_vec())),
                BufferLookup::Deleted => return Ok(None),
                BufferLookup::Absent => {}
            }
        }

        self.ensure_snapshot()?;
        Ok(self.store.get(key, self.snapshot.as_ref())?)
    }

    /// Iterates over every key in ascending order, merging this unit's
    /// pending writes over its snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn new_iterator(&mut self) -> CoreResult<OverlayIter<'_, KvIter>> {
        self.ensure_snapshot()?;
        let base = self.store.iter(self.snapshot.as_ref())?;
        let buffer = self.write_buffer.get_or_insert_with(WriteBuffer::new);
        Ok(buffer.overlay(base))
    }

    /// Buffers a write of `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::WriteConflict`] if another unit of work owns the
    /// key, or [`CoreError::InvalidOperation`] outside a unit of work.
    pub fn put(&mut self, key: &[u8], value: Vec<u8>) -> CoreResult<()> {
        self.ensure_in_unit_of_work("put")?;
        self.tracker.register_write(self.txn, key)?;
        trace!(txn = %self.txn, key = ?key, len = value.len(), "buffered put");
        self.write_buffer
            .get_or_insert_with(WriteBuffer::new)
            .put(key.to_vec(), value);
        Ok(())
    }

    /// Buffers a delete of `key`.
    ///
    /// # Errors
    ///
    /// Same as [`KvRecoveryUnit::put`].
    pub fn delete(&mut self, key: &[u8]) -> CoreResult<()> {
        self.ensure_in_unit_of_work("delete")?;
        self.tracker.register_write(self.txn, key)?;
        trace!(txn = %self.txn, key = ?key, "buffered delete");
        self.write_buffer
            .get_or_insert_with(WriteBuffer::new)
            .delete(key.to_vec());
        Ok(())
    }

    /// Adds `delta` to the counter persisted under `key`.
    ///
    /// The shared `counter` and the persisted total are updated once, at
    /// commit, with the sum of every delta for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidOperation`] outside a unit of work.
    pub fn increment_counter(
        &mut self,
        key: &[u8],
        counter: &Counter,
        delta: i64,
    ) -> CoreResult<()> {
        self.ensure_in_unit_of_work("increment_counter")?;
        self.counters.increment(key, counter, delta);
        Ok(())
    }

    /// Returns the uncommitted adjustment pending for the counter at `key`.
    #[must_use]
    pub fn delta_counter(&self, key: &[u8]) -> i64 {
        self.counters.delta(key)
    }

    fn ensure_in_unit_of_work(&self, operation: &str) -> CoreResult<()> {
        if self.depth == 0 {
            return Err(CoreError::invalid_operation(format!(
                "{operation} requires an open unit of work"
            )));
        }
        Ok(())
    }

    fn ensure_snapshot(&mut self) -> CoreResult<()> {
        if self.snapshot.is_none() {
            // Record the snapshot id first; see the type docs.
            let snapshot_id = self.tracker.record_snapshot_id(self.txn);
            let snapshot = self.store.snapshot()?;
            debug!(
                txn = %self.txn,
                %snapshot_id,
                store_seq = snapshot.sequence(),
                "captured snapshot"
            );
            self.snapshot = Some(snapshot);
        }
        Ok(())
    }

    fn release_snapshot(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            self.store.release_snapshot(snapshot);
        }
    }

    fn commit_physical(&mut self) {
        if !self.counters.is_empty() {
            let buffer = self.write_buffer.get_or_insert_with(WriteBuffer::new);
            self.counters.flush_into(buffer);
        }

        if let Some(buffer) = self.write_buffer.as_ref().filter(|b| b.op_count() > 0) {
            let batch = buffer.to_batch();
            let options = WriteOptions {
                disable_wal: !self.durable,
            };
            if let Err(source) = self.store.write(&batch, options) {
                let fault = StorageFault {
                    operation: "commit",
                    ops: batch.count(),
                    source,
                };
                error!(txn = %self.txn, %fault, "commit batch rejected");
                (self.fault_handler)(&fault);
            }
            let seq = self.tracker.commit(self.txn);
            debug!(txn = %self.txn, %seq, ops = batch.count(), "committed");
        } else {
            // Nothing was written, but the snapshot id recorded for the
            // released snapshot must not outlive it.
            self.tracker.abort(self.txn);
        }

        self.changes.commit_all();
        self.release_snapshot();
        self.counters.clear();
        self.write_buffer = None;
    }

    fn abort_physical(&mut self) {
        if self.pending_ops() > 0 || !self.changes.is_empty() {
            debug!(
                txn = %self.txn,
                ops = self.pending_ops(),
                changes = self.changes.len(),
                "aborting"
            );
        }

        self.changes.rollback_all();
        self.tracker.abort(self.txn);
        self.counters.clear();
        self.write_buffer = None;
        self.release_snapshot();
    }
}

impl RecoveryUnit for KvRecoveryUnit {
    fn begin_unit_of_work(&mut self) {
        self.depth += 1;
        trace!(txn = %self.txn, depth = self.depth, "begin unit of work");
    }

    fn commit_unit_of_work(&mut self) -> CoreResult<()> {
        match self.depth {
            0 => Err(CoreError::invalid_operation(
                "commit_unit_of_work called outside a unit of work",
            )),
            1 => {
                self.commit_physical();
                Ok(())
            }
            // Only the outermost scope commits.
            _ => Ok(()),
        }
    }

    fn end_unit_of_work(&mut self) -> CoreResult<()> {
        if self.depth == 0 {
            return Err(CoreError::invalid_operation(
                "end_unit_of_work called outside a unit of work",
            ));
        }
        self.depth -= 1;
        trace!(txn = %self.txn, depth = self.depth, "end unit of work");
        if self.depth == 0 {
            self.abort_physical();
        }
        Ok(())
    }

    fn commit_and_restart(&mut self) -> CoreResult<()> {
        if self.depth != 0 {
            return Err(CoreError::invalid_operation(format!(
                "commit_and_restart called with {} open units of work",
                self.depth
            )));
        }
        self.commit_physical();
        Ok(())
    }

    fn await_commit(&mut self) -> bool {
        match self.store.flush_wal() {
            Ok(()) => true,
            Err(err) => {
                error!(txn = %self.txn, %err, "WAL flush failed");
                false
            }
        }
    }

    fn register_change(&mut self, change: Box<dyn Change>) {
        self.changes.register(change);
    }

    fn set_oplog_read_till(&mut self, record: RecordId) {
        self.oplog_read_till = Some(record);
    }

    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn as_kv(&self) -> Option<&KvRecoveryUnit> {
        Some(self)
    }

    fn as_kv_mut(&mut self) -> Option<&mut KvRecoveryUnit> {
        Some(self)
    }
}

impl Drop for KvRecoveryUnit {
    fn drop(&mut self) {
        self.abort_physical();
    }
}

impl fmt::Debug for KvRecoveryUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KvRecoveryUnit")
            .field("txn", &self.txn)
            .field("depth", &self.depth)
            .field("durable", &self.durable)
            .field("pending_ops", &self.pending_ops())
            .field("has_snapshot", &self.has_snapshot())
            .field("changes", &self.changes)
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}
