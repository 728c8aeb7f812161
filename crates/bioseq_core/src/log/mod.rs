//! Append-only transaction log.
//!
//! Every committed change to the store lives in the log. A transaction is
//! written as its `Put`/`Delete` records followed by a `Commit` record; a
//! batch without its `Commit` is ignored on replay.
//!
//! ## Record Format
//!
//! ```text
//! | magic (4) | version (2) | type (1) | length (4) | payload (N) | crc32 (4) |
//! ```
//!
//! ## Recovery Policy
//!
//! Tolerated (treated as a clean end of log):
//!
//! - **Truncated header**: fewer than 11 bytes left
//! - **Truncated payload**: record length exceeds the bytes left
//!
//! These come from a crash mid-write. The torn record and any uncommitted
//! records before it are dropped.
//!
//! Fatal (open fails):
//!
//! - **CRC mismatch** → `ChecksumMismatch`
//! - **Invalid magic**, **unknown record type**, **unsupported version**
//!   → `LogCorruption`
//!
//! ## Invariants
//!
//! - The log is **append-only**; records are never modified in place
//! - A commit is acknowledged only after its `Commit` record is flushed
//! - Replay applies only committed transactions and is idempotent

mod iterator;
mod record;
mod writer;

pub use iterator::LogRecordIterator;
pub use record::{compute_crc32, LogRecord, LogRecordType, CRC_SIZE, HEADER_SIZE, LOG_MAGIC, LOG_VERSION};
pub use writer::{LogManager, ValueLocation};
