//! Log replay.

use crate::error::CoreResult;
use crate::log::{LogManager, LogRecord, ValueLocation};
use crate::types::TransactionId;
use std::collections::BTreeMap;
use tracing::debug;

/// State rebuilt from the log at open.
#[derive(Debug)]
pub(crate) struct Recovered {
    /// Committed key directory.
    pub keydir: BTreeMap<String, ValueLocation>,
    /// ID for the session's first transaction.
    pub next_txid: TransactionId,
    /// Offset just past the last `Commit` record.
    pub committed_end: u64,
    /// Records read after the last commit and not applied.
    pub discarded_records: usize,
}

/// Replays every committed batch in `log`.
///
/// Records are buffered per transaction and applied when their `Commit`
/// arrives. A record with a new transaction ID drops the buffered batch,
/// since a batch interrupted by a crash is never resumed.
///
/// # Errors
///
/// Returns an error on checksum mismatch or structural corruption. A torn
/// final record is not an error.
pub(crate) fn replay(log: &LogManager) -> CoreResult<Recovered> {
    let mut keydir = BTreeMap::new();
    let mut batch: Vec<(String, Option<ValueLocation>)> = Vec::new();
    let mut batch_txid: Option<TransactionId> = None;
    let mut max_txid = 0u64;
    let mut committed_end = 0u64;
    let mut commits = 0usize;
    let mut discarded_records = 0usize;

    let mut iter = log.iter()?;
    while let Some(item) = iter.next() {
        let (offset, record) = item?;
        let txid = record.txid();
        max_txid = max_txid.max(txid.as_u64());

        if batch_txid != Some(txid) {
            discarded_records += batch.len();
            batch.clear();
            batch_txid = Some(txid);
        }

        // None for deletes
        let location = record.value_span().map(|(relative, len)| ValueLocation {
            offset: offset + relative,
            len,
        });

        match record {
            LogRecord::Put { key, .. } | LogRecord::Delete { key, .. } => {
                batch.push((key, location));
            }
            LogRecord::Commit { .. } => {
                for (key, location) in batch.drain(..) {
                    match location {
                        Some(location) => {
                            keydir.insert(key, location);
                        }
                        None => {
                            keydir.remove(&key);
                        }
                    }
                }
                batch_txid = None;
                committed_end = iter.position();
                commits += 1;
            }
        }
    }
    discarded_records += batch.len();

    debug!(
        commits,
        entries = keydir.len(),
        committed_end,
        "replayed transaction log"
    );

    Ok(Recovered {
        keydir,
        next_txid: TransactionId::new(max_txid + 1),
        committed_end,
        discarded_records,
    })
}
