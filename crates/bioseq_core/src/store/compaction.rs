//! Log compaction.
//!
//! Every commit appends; overwritten and deleted values stay in the log
//! until it is compacted. Compaction copies the live entries into a fresh
//! log as a single committed batch.
//!
//! ## Invariants
//!
//! - Compaction **MUST NOT** change logical state
//! - The output holds one `Put` per live key, in key order, then a `Commit`

use crate::error::CoreResult;
use crate::log::{LogManager, LogRecord, ValueLocation};
use crate::types::TransactionId;
use std::collections::BTreeMap;

/// Result of a compaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionResult {
    /// Live entries copied.
    pub entries: usize,
    /// Log size before compaction.
    pub bytes_before: u64,
    /// Log size after compaction.
    pub bytes_after: u64,
}

impl CompactionResult {
    /// Bytes reclaimed.
    #[must_use]
    pub fn bytes_saved(&self) -> u64 {
        self.bytes_before.saturating_sub(self.bytes_after)
    }
}

/// Copies the live entries of `source` into the empty log `target`.
///
/// Returns the key directory for `target`.
pub(crate) fn copy_live(
    source: &LogManager,
    keydir: &BTreeMap<String, ValueLocation>,
    target: &mut LogManager,
    txid: TransactionId,
) -> CoreResult<BTreeMap<String, ValueLocation>> {
    let mut compacted = BTreeMap::new();

    for (key, location) in keydir {
        let record = LogRecord::Put {
            txid,
            key: key.clone(),
            value: source.read_value(*location)?,
        };
        let offset = target.append(&record)?;
        if let Some((relative, len)) = record.value_span() {
            compacted.insert(
                key.clone(),
                ValueLocation {
                    offset: offset + relative,
                    len,
                },
            );
        }
    }

    target.append(&LogRecord::Commit { txid })?;
    target.sync()?;

    Ok(compacted)
}
