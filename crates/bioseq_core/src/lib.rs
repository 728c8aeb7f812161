//! # bioseq core
//!
//! Deduplicating storage for biological sequence records.
//!
//! This crate provides:
//! - A text codec for `sequence,classes,label` records
//! - An append-only, checksummed transaction log
//! - A transactional key-value [`Store`] with read-only and read-write
//!   sessions
//! - A content-addressed [`DuplicateIndex`]
//! - [`SequenceDataset`], which merges records with identical sequences
//!   instead of storing them twice
//!
//! ## Example
//!
//! ```rust
//! use bioseq_core::{SequenceDataset, SequenceRecord, StoreConfig};
//!
//! let mut dataset = SequenceDataset::open_in_memory(StoreConfig::default())?;
//! dataset.add_sequence("1", SequenceRecord::new("ab", ["a", "b"], 0), true)?;
//! dataset.add_sequence("2", SequenceRecord::new("ab", ["c"], 0), true)?;
//!
//! let merged = dataset.get_sequence("2")?.unwrap();
//! assert_eq!(merged.encode(), "ab,a;b;c,0");
//! assert_eq!(dataset.len()?, 1);
//! # Ok::<(), bioseq_core::CoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod dataset;
mod dir;
mod error;
mod fasta;
mod index;
pub mod log;
mod record;
mod store;
mod types;

pub use config::{StoreConfig, DEFAULT_MAP_SIZE};
pub use dataset::{AddOutcome, IngestSummary, SequenceDataset};
pub use dir::{StoreLock, StorePaths};
pub use error::{CoreError, CoreResult};
pub use fasta::FastaSource;
pub use index::{DuplicateIndex, SequenceHasher, Sha256Hasher};
pub use record::{SequenceRecord, CLASS_DELIMITER, FIELD_DELIMITER};
pub use store::{CompactionResult, PendingWrite, Store, StoreStats, Transaction};
pub use types::{ContentHash, TransactionId};
