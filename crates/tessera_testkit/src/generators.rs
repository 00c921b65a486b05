//! Property-based test generators using proptest.
//!
//! Keys come from a deliberately small alphabet so generated operation
//! sequences hit the same keys often: overwrites, deletes of buffered keys
//! and buffer entries shadowing seeded ones are the interesting cases.

use proptest::prelude::*;
use std::collections::BTreeMap;

/// Strategy for generating keys from a small key space.
pub fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::string::string_regex("[a-e]{1,2}")
        .expect("Invalid regex")
        .prop_map(String::into_bytes)
}

/// Strategy for generating values (arbitrary bytes, possibly empty).
pub fn value_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..16)
}

/// Strategy for generating the committed contents of a store.
pub fn seed_strategy() -> impl Strategy<Value = BTreeMap<Vec<u8>, Vec<u8>>> {
    prop::collection::btree_map(key_strategy(), value_strategy(), 0..8)
}

/// An operation issued through a recovery unit.
#[derive(Debug, Clone)]
pub enum KvOperation {
    /// Buffer a write
    Put {
        /// Key
        key: Vec<u8>,
        /// Value
        value: Vec<u8>,
    },
    /// Buffer a delete
    Delete {
        /// Key
        key: Vec<u8>,
    },
    /// Read through the buffer
    Get {
        /// Key
        key: Vec<u8>,
    },
}

impl KvOperation {
    /// Applies the operation to a model map, returning the value a read
    /// should observe for `Get`.
    pub fn apply_to_model(&self, model: &mut BTreeMap<Vec<u8>, Vec<u8>>) -> Option<Vec<u8>> {
        match self {
            Self::Put { key, value } => {
                model.insert(key.clone(), value.clone());
                None
            }
            Self::Delete { key } => {
                model.remove(key);
                None
            }
            Self::Get { key } => model.get(key).cloned(),
        }
    }
}

/// Strategy for generating one operation.
pub fn kv_operation_strategy() -> impl Strategy<Value = KvOperation> {
    prop_oneof![
        3 => (key_strategy(), value_strategy())
            .prop_map(|(key, value)| KvOperation::Put { key, value }),
        1 => key_strategy().prop_map(|key| KvOperation::Delete { key }),
        2 => key_strategy().prop_map(|key| KvOperation::Get { key }),
    ]
}

/// Strategy for generating up to `max_len` operations.
pub fn kv_operations_strategy(max_len: usize) -> impl Strategy<Value = Vec<KvOperation>> {
    prop::collection::vec(kv_operation_strategy(), 0..max_len)
}

/// Strategy for generating a run of counter deltas, zeros included.
pub fn counter_deltas_strategy() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(prop_oneof![1 => Just(0i64), 4 => -1_000i64..1_000], 0..16)
}
