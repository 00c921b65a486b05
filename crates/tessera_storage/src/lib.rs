//! # Tessera Storage
//!
//! Ordered key-value store abstraction for Tessera.
//!
//! This crate provides the lowest-level storage contract the recovery unit is
//! built on. A store offers:
//!
//! - Point lookups and ascending iteration, optionally scoped to a snapshot
//! - All-or-nothing application of a [`WriteBatch`]
//! - Reference-counted [`Snapshot`] handles that pin a consistent read view
//! - A WAL flush barrier for batches written with the WAL disabled
//!
//! ## Available Stores
//!
//! - [`InMemoryStore`] - Multi-version in-memory store for tests and ephemeral use
//!
//! ## Example
//!
//! ```rust
//! use tessera_storage::{InMemoryStore, KvStore, WriteBatch, WriteOptions};
//!
//! let store = InMemoryStore::new();
//! let mut batch = WriteBatch::new();
//! batch.put(b"k".to_vec(), b"v".to_vec());
//! store.write(&batch, WriteOptions::default()).unwrap();
//!
//! assert_eq!(store.get(b"k", None).unwrap(), Some(b"v".to_vec()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod error;
mod memory;
mod snapshot;
mod store;

pub use batch::{BatchOp, WriteBatch, WriteOptions};
pub use error::{StorageError, StorageResult};
pub use memory::{InMemoryStore, StoreStats};
pub use snapshot::{Snapshot, SnapshotList};
pub use store::{KvIter, KvStore};
