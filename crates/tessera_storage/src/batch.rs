//! Write batches and write options.

/// A single operation inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Insert or overwrite a key.
    Put {
        /// Key bytes.
        key: Vec<u8>,
        /// Value bytes.
        value: Vec<u8>,
    },
    /// Remove a key.
    Delete {
        /// Key bytes.
        key: Vec<u8>,
    },
}

impl BatchOp {
    /// Returns the key this operation targets.
    #[must_use]
    pub fn key(&self) -> &[u8] {
        match self {
            Self::Put { key, .. } | Self::Delete { key } => key,
        }
    }
}

/// An ordered group of operations applied atomically by [`crate::KvStore::write`].
///
/// Operations are applied in insertion order, so a later operation on the
/// same key wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a put.
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push(BatchOp::Put { key, value });
    }

    /// Appends a delete.
    pub fn delete(&mut self, key: Vec<u8>) {
        self.ops.push(BatchOp::Delete { key });
    }

    /// Returns the number of operations in the batch.
    #[must_use]
    pub fn count(&self) -> usize {
        self.ops.len()
    }

    /// Returns true if the batch holds no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Iterates over the operations in application order.
    pub fn iter(&self) -> impl Iterator<Item = &BatchOp> {
        self.ops.iter()
    }
}

/// Options for [`crate::KvStore::write`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOptions {
    /// Skip the write-ahead log for this batch.
    ///
    /// The batch becomes visible immediately but is only durable after the
    /// next [`crate::KvStore::flush_wal`].
    pub disable_wal: bool,
}

impl WriteOptions {
    /// Options for a batch that must be logged before it is acknowledged.
    #[must_use]
    pub const fn durable() -> Self {
        Self { disable_wal: false }
    }

    /// Options for a batch that may skip the WAL.
    #[must_use]
    pub const fn unlogged() -> Self {
        Self { disable_wal: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_preserves_order() {
        let mut batch = WriteBatch::new();
        batch.put(b"a".to_vec(), b"1".to_vec());
        batch.delete(b"a".to_vec());

        assert_eq!(batch.count(), 2);
        let keys: Vec<_> = batch.iter().map(BatchOp::key).collect();
        assert_eq!(keys, vec![b"a".as_slice(), b"a".as_slice()]);
        assert!(matches!(batch.iter().last(), Some(BatchOp::Delete { .. })));
    }

    #[test]
    fn empty_batch() {
        let batch = WriteBatch::new();
        assert!(batch.is_empty());
        assert_eq!(batch.count(), 0);
    }

    #[test]
    fn write_options_constructors() {
        assert!(!WriteOptions::durable().disable_wal);
        assert!(WriteOptions::unlogged().disable_wal);
        assert_eq!(WriteOptions::default(), WriteOptions::durable());
    }
}
