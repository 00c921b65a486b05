//! Write buffer with read-your-own-writes overlay.
//!
//! A [`WriteBuffer`] stages the puts and deletes of one unit of work. Nothing
//! in it is visible to other readers until the recovery unit applies it to
//! the store as a single batch. While it is pending the owning unit reads
//! through it:
//! - point lookups probe the buffer first ([`WriteBuffer::lookup`])
//! - range scans merge it over a base iterator ([`WriteBuffer::overlay`])

use std::cmp::Ordering;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::iter::Peekable;
use tessera_storage::WriteBatch;

/// Latest buffered operation for a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferedOp {
    /// The key was written with this value.
    Put(Vec<u8>),
    /// The key was deleted.
    Delete,
}

/// Result of probing the buffer for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferLookup<'a> {
    /// The buffer holds a value for the key.
    Value(&'a [u8]),
    /// The buffer holds a delete marker for the key.
    Deleted,
    /// The buffer has nothing for the key; consult the store.
    Absent,
}

/// Pending writes of one unit of work.
///
/// Only the last operation per key is kept, but [`WriteBuffer::op_count`]
/// counts every operation appended since the buffer was created.
#[derive(Debug, Clone, Default)]
pub struct WriteBuffer {
    entries: BTreeMap<Vec<u8>, BufferedOp>,
    op_count: usize,
}

impl WriteBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers a put.
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.entries.insert(key, BufferedOp::Put(value));
        self.op_count += 1;
    }

    /// Buffers a delete.
    pub fn delete(&mut self, key: Vec<u8>) {
        self.entries.insert(key, BufferedOp::Delete);
        self.op_count += 1;
    }

    /// Probes the buffer for `key`.
    #[must_use]
    pub fn lookup(&self, key: &[u8]) -> BufferLookup<'_> {
        match self.entries.get(key) {
            Some(BufferedOp::Put(value)) => BufferLookup::Value(value),
            Some(BufferedOp::Delete) => BufferLookup::Deleted,
            None => BufferLookup::Absent,
        }
    }

    /// Number of operations appended.
    #[must_use]
    pub fn op_count(&self) -> usize {
        self.op_count
    }

    /// Number of distinct keys touched.
    #[must_use]
    pub fn key_count(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing has been buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.op_count == 0
    }

    /// Builds the batch that makes the buffered writes durable, in key order.
    #[must_use]
    pub fn to_batch(&self) -> WriteBatch {
        let mut batch = WriteBatch::new();
        for (key, op) in &self.entries {
            match op {
                BufferedOp::Put(value) => batch.put(key.clone(), value.clone()),
                BufferedOp::Delete => batch.delete(key.clone()),
            }
        }
        batch
    }

    /// Merges the buffer over `base`, which must yield keys in ascending order.
    ///
    /// Buffered puts shadow base values, buffered deletes hide base keys and
    /// every other key comes from `base` unchanged.
    pub fn overlay<I>(&self, base: I) -> OverlayIter<'_, I>
    where
        I: Iterator<Item = (Vec<u8>, Vec<u8>)>,
    {
        OverlayIter {
            buffered: self.entries.iter().peekable(),
            base: base.peekable(),
        }
    }
}

/// Iterator returned by [`WriteBuffer::overlay`].
pub struct OverlayIter<'a, I>
where
    I: Iterator<Item = (Vec<u8>, Vec<u8>)>,
{
    buffered: Peekable<btree_map::Iter<'a, Vec<u8>, BufferedOp>>,
    base: Peekable<I>,
}

impl<I> Iterator for OverlayIter<'_, I>
where
    I: Iterator<Item = (Vec<u8>, Vec<u8>)>,
{
    type Item = (Vec<u8>, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let order = match (self.buffered.peek(), self.base.peek()) {
                (None, None) => return None,
                (None, Some(_)) => return self.base.next(),
                (Some(_), None) => Ordering::Less,
                (Some((buffered, _)), Some((base, _))) => buffered.as_slice().cmp(base.as_slice()),
            };

            match order {
                Ordering::Greater => return self.base.next(),
                Ordering::Equal | Ordering::Less => {
                    if order == Ordering::Equal {
                        // Shadowed by the buffer.
                        self.base.next();
                    }
                    if let Some((key, BufferedOp::Put(value))) = self.buffered.next() {
                        return Some((key.clone(), value.clone()));
                    }
                }
            }
        }
    }
}
