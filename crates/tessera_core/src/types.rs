//! Identifiers handed out by the conflict tracker and the record layer.

use std::fmt;

/// Transaction owned by one recovery unit for its whole lifetime.
///
/// Assigned by [`ConflictTracker::begin`](crate::ConflictTracker::begin);
/// ids grow monotonically and are not reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TransactionId(u64);

impl TransactionId {
    /// Wraps a raw id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Raw id.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "txn:{}", self.0)
    }
}

/// Position in the conflict tracker's commit order.
///
/// Snapshot ids and commit stamps share this space: a key committed at a
/// sequence greater than a transaction's snapshot id was written after that
/// transaction started reading. Unrelated to the store's own batch sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SequenceNumber(u64);

impl SequenceNumber {
    /// Wraps a raw sequence.
    #[must_use]
    pub const fn new(seq: u64) -> Self {
        Self(seq)
    }

    /// Raw sequence.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seq:{}", self.0)
    }
}

/// Record position in a record store; used as the oplog read marker.
///
/// Signed, since record stores may place sentinel records below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(i64);

impl RecordId {
    /// Wraps a raw record position.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Raw record position.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rid:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefixes() {
        assert_eq!(TransactionId::new(7).to_string(), "txn:7");
        assert_eq!(SequenceNumber::new(3).to_string(), "seq:3");
        assert_eq!(RecordId::from(-3).to_string(), "rid:-3");
    }

    #[test]
    fn ordering_follows_raw_value() {
        assert!(TransactionId::new(1) < TransactionId::new(2));
        assert!(SequenceNumber::new(9) > SequenceNumber::new(4));
        assert_eq!(RecordId::new(42).get(), 42);
    }
}
