//! # bioseq testkit
//!
//! Test utilities for the bioseq sequence store.
//!
//! This crate provides:
//! - Dataset fixtures backed by memory or a temporary directory
//! - Property-based generators for records and ingestion input
//! - A storage backend that simulates crashes mid-write
//! - Tracing setup for tests
//!
//! ## Usage
//!
//! ```rust
//! use bioseq_testkit::prelude::*;
//!
//! with_memory_dataset(|dataset| {
//!     dataset
//!         .add_sequence("1", SequenceRecord::new("MKV", ["toxin"], 1), true)
//!         .unwrap();
//!     assert_eq!(dataset.len().unwrap(), 1);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;
pub mod integration;
#[cfg(test)]
mod properties;

use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::init_tracing;
    pub use bioseq_core::{SequenceDataset, SequenceRecord, StoreConfig};
}

pub use crash::*;
pub use fixtures::*;
pub use generators::*;

static TRACING: Once = Once::new();

/// Installs a test-friendly subscriber, once per process.
///
/// The filter comes from `RUST_LOG` and defaults to `warn`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
