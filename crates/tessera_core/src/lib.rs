//! # Tessera Core
//!
//! Per-operation transaction context for the Tessera key-value engine.
//!
//! This crate provides:
//! - [`KvRecoveryUnit`]: nested units of work over a snapshot, with
//!   buffered writes that only the owning operation can see
//! - [`WriteBuffer`]: read-your-own-writes overlay for point reads and scans
//! - [`ChangeList`]: in-memory side effects committed or rolled back with
//!   the unit of work
//! - [`CounterDeltas`]: counter adjustments coalesced into one write per
//!   counter
//! - [`TransactionEngine`]: write-write conflict tracking
//!
//! A rejected commit batch is not an error the caller can handle: it is
//! passed to [`Config::fault_handler`], which aborts the process by default.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change;
mod config;
mod context;
mod counter;
mod engine;
mod error;
mod recovery_unit;
mod transaction;
mod types;
mod write_buffer;

pub use change::{on_commit, on_rollback, Change, ChangeList, FnChange};
pub use config::{abort_on_fault, Config, FaultHandler};
pub use context::OperationContext;
pub use counter::{
    decode_counter, encode_counter, load_counter, Counter, CounterDeltas, COUNTER_WIDTH,
};
pub use engine::KvEngine;
pub use error::{CoreError, CoreResult, StorageFault};
pub use recovery_unit::{KvRecoveryUnit, NoopRecoveryUnit, RecoveryUnit, WriteUnitOfWork};
pub use transaction::{ConflictTracker, TransactionEngine};
pub use types::{RecordId, SequenceNumber, TransactionId};
pub use write_buffer::{BufferLookup, BufferedOp, OverlayIter, WriteBuffer};
