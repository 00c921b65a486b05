//! Coalesced counter deltas.
//!
//! Record counts and data sizes are bumped many times per unit of work. The
//! recovery unit collects those bumps in [`CounterDeltas`] and turns them
//! into one atomic add and one persisted write per counter at commit.
//!
//! # Persisted format
//!
//! A counter is stored under its key as exactly [`COUNTER_WIDTH`] bytes: the
//! total as a little-endian two's-complement `i64`.

use crate::error::{CoreError, CoreResult};
use crate::write_buffer::WriteBuffer;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tessera_storage::KvStore;

/// Shared in-memory counter, updated by every unit of work that commits a delta.
pub type Counter = Arc<AtomicI64>;

/// Size in bytes of a persisted counter.
pub const COUNTER_WIDTH: usize = 8;

/// Encodes a counter total for storage.
#[must_use]
pub fn encode_counter(value: i64) -> [u8; COUNTER_WIDTH] {
    value.to_le_bytes()
}

/// Decodes a counter total read from `key`.
///
/// # Errors
///
/// Returns [`CoreError::CorruptCounter`] if `bytes` is not exactly
/// [`COUNTER_WIDTH`] long.
pub fn decode_counter(key: &[u8], bytes: &[u8]) -> CoreResult<i64> {
    let raw: [u8; COUNTER_WIDTH] = bytes.try_into().map_err(|_| CoreError::CorruptCounter {
        key: key.to_vec(),
        len: bytes.len(),
    })?;
    Ok(i64::from_le_bytes(raw))
}

/// Reads the latest persisted total of a counter, or 0 if it was never written.
///
/// # Errors
///
/// Returns an error if the store cannot be read or the value is corrupt.
pub fn load_counter(store: &dyn KvStore, key: &[u8]) -> CoreResult<i64> {
    match store.get(key, None)? {
        Some(bytes) => decode_counter(key, &bytes),
        None => Ok(0),
    }
}

struct CounterEntry {
    counter: Counter,
    delta: i64,
}

/// Pending counter adjustments of one unit of work, one entry per key.
#[derive(Default)]
pub struct CounterDeltas {
    entries: BTreeMap<Vec<u8>, CounterEntry>,
}

impl CounterDeltas {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `delta` to the pending adjustment for `key`. Zero deltas are ignored.
    ///
    /// The first increment for a key decides which shared counter it flushes to.
    pub fn increment(&mut self, key: &[u8], counter: &Counter, delta: i64) {
        if delta == 0 {
            return;
        }
        match self.entries.get_mut(key) {
            Some(entry) => entry.delta = entry.delta.wrapping_add(delta),
            None => {
                self.entries.insert(
                    key.to_vec(),
                    CounterEntry {
                        counter: Arc::clone(counter),
                        delta,
                    },
                );
            }
        }
    }

    /// Returns the pending adjustment for `key`, or 0.
    #[must_use]
    pub fn delta(&self, key: &[u8]) -> i64 {
        self.entries.get(key).map_or(0, |entry| entry.delta)
    }

    /// Applies every pending delta to its shared counter and buffers the new
    /// totals for persistence. The map is empty afterwards.
    pub fn flush_into(&mut self, buffer: &mut WriteBuffer) {
        for (key, entry) in std::mem::take(&mut self.entries) {
            let total = entry
                .counter
                .fetch_add(entry.delta, Ordering::Relaxed)
                .wrapping_add(entry.delta);
            tracing::trace!(key = ?key, delta = entry.delta, total, "flushing counter");
            buffer.put(key, encode_counter(total).to_vec());
        }
    }

    /// Drops every pending delta.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of counters with a pending delta.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for CounterDeltas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(key, entry)| (key, entry.delta)))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::write_buffer::BufferLookup;
    use tessera_storage::{InMemoryStore, WriteBatch, WriteOptions};

    #[test]
    fn encoding_is_little_endian() {
        assert_eq!(encode_counter(1), [1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(encode_counter(-1), [0xff; 8]);
        assert_eq!(decode_counter(b"k", &encode_counter(-42)).unwrap(), -42);
    }

    #[test]
    fn decode_rejects_wrong_width() {
        let err = decode_counter(b"k", &[1, 2, 3]).unwrap_err();
        assert!(matches!(err, CoreError::CorruptCounter { len: 3, .. }));
    }

    #[test]
    fn deltas_coalesce_per_key() {
        let counter: Counter = Arc::new(AtomicI64::new(10));
        let mut deltas = CounterDeltas::new();
        deltas.increment(b"x", &counter, 3);
        deltas.increment(b"x", &counter, 2);

        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas.delta(b"x"), 5);
        assert_eq!(deltas.delta(b"y"), 0);
        assert_eq!(counter.load(Ordering::Relaxed), 10);
    }

    #[test]
    fn zero_delta_creates_no_entry() {
        let counter: Counter = Arc::new(AtomicI64::new(0));
        let mut deltas = CounterDeltas::new();
        deltas.increment(b"x", &counter, 0);
        assert!(deltas.is_empty());
        assert_eq!(deltas.delta(b"x"), 0);
    }

    #[test]
    fn flush_updates_counter_and_buffer() {
        let counter: Counter = Arc::new(AtomicI64::new(10));
        let mut deltas = CounterDeltas::new();
        deltas.increment(b"x", &counter, 3);
        deltas.increment(b"x", &counter, 2);

        let mut buffer = WriteBuffer::new();
        deltas.flush_into(&mut buffer);

        assert!(deltas.is_empty());
        assert_eq!(counter.load(Ordering::Relaxed), 15);
        assert_eq!(buffer.op_count(), 1);
        let encoded = encode_counter(15);
        assert_eq!(buffer.lookup(b"x"), BufferLookup::Value(&encoded));
    }

    #[test]
    fn deltas_cancelling_out_still_flush() {
        let counter: Counter = Arc::new(AtomicI64::new(7));
        let mut deltas = CounterDeltas::new();
        deltas.increment(b"x", &counter, 4);
        deltas.increment(b"x", &counter, -4);
        assert_eq!(deltas.delta(b"x"), 0);

        let mut buffer = WriteBuffer::new();
        deltas.flush_into(&mut buffer);
        assert_eq!(counter.load(Ordering::Relaxed), 7);
        assert_eq!(buffer.op_count(), 1);
    }

    #[test]
    fn load_counter_reads_store() {
        let store = InMemoryStore::new();
        assert_eq!(load_counter(&store, b"x").unwrap(), 0);

        let mut batch = WriteBatch::new();
        batch.put(b"x".to_vec(), encode_counter(99).to_vec());
        store.write(&batch, WriteOptions::default()).unwrap();
        assert_eq!(load_counter(&store, b"x").unwrap(), 99);
    }
}
