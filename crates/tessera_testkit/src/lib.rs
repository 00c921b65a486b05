//! # Tessera Testkit
//!
//! Test utilities for Tessera.
//!
//! This crate provides:
//! - Engine fixtures over an inspectable in-memory store
//! - Property-based test generators using proptest
//! - A recording [`Change`](tessera_core::Change) for checking commit and
//!   rollback order
//! - A multi-threaded stress driver for conflicting writers
//!
//! ## Usage
//!
//! ```rust
//! use tessera_core::RecoveryUnit;
//! use tessera_testkit::prelude::*;
//!
//! with_test_engine(|engine| {
//!     let recorder = ChangeRecorder::new();
//!     let mut unit = engine.recovery_unit();
//!     unit.begin_unit_of_work();
//!     unit.register_change(recorder.change("a"));
//!     unit.end_unit_of_work().unwrap();
//!     assert_eq!(recorder.rolled_back(), vec!["a"]);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod recorder;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::init_tracing;
    pub use crate::recorder::*;
    pub use crate::stress::*;
}

pub use fixtures::*;
pub use generators::*;
pub use recorder::*;
pub use stress::*;

use tracing_subscriber::EnvFilter;

/// Installs a `tracing` subscriber for tests, filtered by `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
