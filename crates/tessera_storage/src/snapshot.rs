//! Snapshot handles.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Registry of live snapshots for one store.
///
/// Snapshots are reference counted per sequence number so the store can tell
/// which old versions are still reachable.
#[derive(Debug, Default)]
pub struct SnapshotList {
    live: Mutex<BTreeMap<u64, usize>>,
}

impl SnapshotList {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pins `sequence` and returns a handle that unpins it when released.
    pub fn acquire(self: &Arc<Self>, sequence: u64) -> Snapshot {
        *self.live.lock().entry(sequence).or_insert(0) += 1;
        Snapshot {
            sequence,
            list: Arc::clone(self),
        }
    }

    /// Returns the oldest pinned sequence, if any snapshot is live.
    #[must_use]
    pub fn oldest(&self) -> Option<u64> {
        self.live.lock().keys().next().copied()
    }

    /// Returns the number of live snapshot handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live.lock().values().sum()
    }

    /// Returns true if no snapshot is live.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.live.lock().is_empty()
    }

    fn release(&self, sequence: u64) {
        let mut live = self.live.lock();
        if let Some(count) = live.get_mut(&sequence) {
            *count -= 1;
            if *count == 0 {
                live.remove(&sequence);
            }
        }
    }
}

/// A consistent point-in-time read view of a store.
///
/// The handle is not clonable, so each acquisition is released exactly once:
/// either through [`crate::KvStore::release_snapshot`] or by dropping it.
pub struct Snapshot {
    sequence: u64,
    list: Arc<SnapshotList>,
}

impl Snapshot {
    /// Returns the store sequence number this snapshot pins.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl Drop for Snapshot {
    fn drop(&mut self) {
        self.list.release(self.sequence);
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}
