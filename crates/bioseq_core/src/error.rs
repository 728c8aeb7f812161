//! Error types for the sequence store.

use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in sequence store operations.
///
/// A missing key is never an error: lookups return `Ok(None)`.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] bioseq_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The store (or dataset) was used before it was opened.
    #[error("the store is not initialized")]
    NotInitialized,

    /// The store was used after it was closed.
    #[error("the store is closed")]
    StoreClosed,

    /// A mutation was attempted on a store opened read-only.
    #[error("the store was opened read-only")]
    ReadOnly,

    /// A stored value is not a well-formed `sequence,classes,label` record.
    #[error("malformed record {value:?}: {reason}")]
    MalformedRecord {
        /// The offending value.
        value: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A duplicate sequence was found with a different label.
    #[error("conflicting labels for identical sequences: key {existing_key} has label {existing}, incoming label is {incoming}")]
    ConflictingLabel {
        /// Key of the record already in the store.
        existing_key: String,
        /// Label of the record already in the store.
        existing: i64,
        /// Label of the record being inserted.
        incoming: i64,
    },

    /// The transaction log is corrupted.
    #[error("log corruption: {message}")]
    LogCorruption {
        /// Description of the corruption.
        message: String,
    },

    /// Checksum mismatch detected in the log.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Expected checksum.
        expected: u32,
        /// Actual checksum.
        actual: u32,
    },

    /// A key or value does not fit the log's 4-byte length fields.
    #[error("record too large: {size} bytes")]
    RecordTooLarge {
        /// Size of the rejected field or payload.
        size: usize,
    },

    /// Committing the pending batch would exceed the configured map size.
    #[error("map size exhausted: {required} bytes required, map size is {map_size}")]
    MapFull {
        /// Log size the commit would need.
        required: u64,
        /// Configured maximum size.
        map_size: u64,
    },

    /// Another session holds the write lock.
    #[error("store locked: another process has write access")]
    StoreLocked,

    /// The store does not exist and may not be created.
    #[error("store not found: {path}")]
    StoreNotFound {
        /// The requested location.
        path: String,
    },

    /// The FASTA reader failed.
    #[error("FASTA parse error: {message}")]
    Fasta {
        /// Description from the parser.
        message: String,
    },
}

impl CoreError {
    /// Creates a malformed record error.
    pub fn malformed(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Creates a log corruption error.
    pub fn log_corruption(message: impl Into<String>) -> Self {
        Self::LogCorruption {
            message: message.into(),
        }
    }

    /// Creates a FASTA parse error.
    pub fn fasta(message: impl Into<String>) -> Self {
        Self::Fasta {
            message: message.into(),
        }
    }

    /// Returns whether this error is a label conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::ConflictingLabel { .. })
    }
}
