//! Default conflict tracker.

use crate::error::{CoreError, CoreResult};
use crate::transaction::ConflictTracker;
use crate::types::{SequenceNumber, TransactionId};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
struct TxnRecord {
    snapshot_id: Option<u64>,
    writes: HashSet<Vec<u8>>,
}

#[derive(Debug, Default)]
struct EngineState {
    /// Last commit sequence handed out.
    committed_seq: u64,
    /// Open transactions.
    active: HashMap<TransactionId, TxnRecord>,
    /// Key -> transaction holding an uncommitted write on it.
    uncommitted: HashMap<Vec<u8>, TransactionId>,
    /// Key -> sequence of its last commit, kept while some snapshot may predate it.
    committed: HashMap<Vec<u8>, u64>,
}

impl EngineState {
    fn record(&mut self, txn: TransactionId) -> &mut TxnRecord {
        self.active.entry(txn).or_default()
    }

    fn release_claims(&mut self, txn: TransactionId, record: &TxnRecord) {
        for key in &record.writes {
            if self.uncommitted.get(key) == Some(&txn) {
                self.uncommitted.remove(key);
            }
        }
    }

    /// Forgets commit stamps that no active snapshot can conflict with.
    fn prune_committed(&mut self) {
        let oldest = self
            .active
            .values()
            .filter_map(|record| record.snapshot_id)
            .min();
        match oldest {
            Some(oldest) => self.committed.retain(|_, seq| *seq > oldest),
            None => self.committed.clear(),
        }
    }
}

/// First-writer-wins conflict tracker.
///
/// A write to a key conflicts when:
/// - another open transaction already wrote the key and has not finished, or
/// - the key was committed at a sequence newer than the writer's snapshot id.
///
/// A transaction that never recorded a snapshot id has read nothing, so only
/// the first rule applies to it.
#[derive(Debug)]
pub struct TransactionEngine {
    next_txid: AtomicU64,
    state: Mutex<EngineState>,
}

impl Default for TransactionEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionEngine {
    /// Creates a new tracker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_txid: AtomicU64::new(1),
            state: Mutex::new(EngineState::default()),
        }
    }

    /// Returns the last commit sequence handed out.
    #[must_use]
    pub fn committed_seq(&self) -> SequenceNumber {
        SequenceNumber::new(self.state.lock().committed_seq)
    }

    /// Returns the number of transactions with tracked state.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.state.lock().active.len()
    }

    /// Returns the number of keys with an uncommitted claim.
    #[must_use]
    pub fn claimed_keys(&self) -> usize {
        self.state.lock().uncommitted.len()
    }
}

impl ConflictTracker for TransactionEngine {
    fn begin(&self) -> TransactionId {
        let txn = TransactionId::new(self.next_txid.fetch_add(1, Ordering::SeqCst));
        self.state.lock().record(txn);
        txn
    }

    fn record_snapshot_id(&self, txn: TransactionId) -> SequenceNumber {
        let mut state = self.state.lock();
        let id = state.committed_seq;
        state.record(txn).snapshot_id = Some(id);
        SequenceNumber::new(id)
    }

    fn register_write(&self, txn: TransactionId, key: &[u8]) -> CoreResult<()> {
        let mut state = self.state.lock();

        if let Some(owner) = state.uncommitted.get(key) {
            if *owner != txn {
                tracing::debug!(%txn, %owner, "write conflict with open transaction");
                return Err(CoreError::write_conflict(key));
            }
            return Ok(());
        }

        let snapshot_id = state.active.get(&txn).and_then(|record| record.snapshot_id);
        if let (Some(snapshot_id), Some(&committed)) = (snapshot_id, state.committed.get(key)) {
            if committed > snapshot_id {
                tracing::debug!(%txn, snapshot_id, committed, "write conflict with newer commit");
                return Err(CoreError::write_conflict(key));
            }
        }

        state.uncommitted.insert(key.to_vec(), txn);
        state.record(txn).writes.insert(key.to_vec());
        Ok(())
    }

    fn commit(&self, txn: TransactionId) -> SequenceNumber {
        let mut state = self.state.lock();
        state.committed_seq += 1;
        let seq = state.committed_seq;

        if let Some(record) = state.active.remove(&txn) {
            state.release_claims(txn, &record);
            for key in record.writes {
                state.committed.insert(key, seq);
            }
        }
        state.prune_committed();

        SequenceNumber::new(seq)
    }

    fn abort(&self, txn: TransactionId) {
        let mut state = self.state.lock();
        if let Some(record) = state.active.remove(&txn) {
            state.release_claims(txn, &record);
        }
    }
}
