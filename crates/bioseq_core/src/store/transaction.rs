//! The session's live transaction.

use crate::log::{CRC_SIZE, HEADER_SIZE};
use crate::types::TransactionId;
use std::collections::BTreeMap;

/// Log bytes taken by a `Commit` record.
const COMMIT_LEN: u64 = (HEADER_SIZE + 8 + CRC_SIZE) as u64;

/// A buffered change to one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingWrite {
    /// Insert or overwrite the key.
    Put(Vec<u8>),
    /// Delete the key.
    Delete,
}

impl PendingWrite {
    /// Log bytes this write takes when committed under `key`.
    fn log_len(&self, key: &str) -> u64 {
        let base = HEADER_SIZE + 8 + 4 + key.len() + CRC_SIZE;
        match self {
            Self::Put(value) => (base + 4 + value.len()) as u64,
            Self::Delete => base as u64,
        }
    }
}

/// Writes buffered since the last commit.
///
/// Every store session has exactly one. Later writes to a key replace
/// earlier ones, so a commit appends at most one record per key.
#[derive(Debug)]
pub struct Transaction {
    id: TransactionId,
    writes: BTreeMap<String, PendingWrite>,
    log_len: u64,
}

impl Transaction {
    /// Creates an empty transaction.
    pub(crate) fn new(id: TransactionId) -> Self {
        Self {
            id,
            writes: BTreeMap::new(),
            log_len: 0,
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Buffers a write, replacing any earlier write to the same key.
    pub(crate) fn record(&mut self, key: &str, write: PendingWrite) {
        self.log_len += write.log_len(key);
        if let Some(previous) = self.writes.insert(key.to_owned(), write) {
            self.log_len -= previous.log_len(key);
        }
    }

    /// Drops a buffered write. Returns whether one existed.
    pub(crate) fn discard(&mut self, key: &str) -> bool {
        match self.writes.remove(key) {
            Some(previous) => {
                self.log_len -= previous.log_len(key);
                true
            }
            None => false,
        }
    }

    /// Returns the buffered write for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&PendingWrite> {
        self.writes.get(key)
    }

    /// Returns all buffered writes in key order.
    pub fn pending_writes(&self) -> impl Iterator<Item = (&String, &PendingWrite)> {
        self.writes.iter()
    }

    /// Returns the number of buffered writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    /// Returns whether nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Log bytes a commit of this transaction appends.
    #[must_use]
    pub fn commit_len(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.log_len + COMMIT_LEN
        }
    }

    /// Log bytes a commit would append after buffering `write` under `key`.
    #[must_use]
    pub fn commit_len_with(&self, key: &str, write: &PendingWrite) -> u64 {
        let replaced = self.writes.get(key).map_or(0, |w| w.log_len(key));
        self.log_len - replaced + write.log_len(key) + COMMIT_LEN
    }

    /// Log bytes a commit would append after applying `changes` in order.
    ///
    /// `None` drops the buffered write for that key.
    #[must_use]
    pub fn commit_len_after(&self, changes: &[(&str, Option<PendingWrite>)]) -> u64 {
        let mut overrides: BTreeMap<&str, Option<&PendingWrite>> = BTreeMap::new();
        for (key, write) in changes {
            overrides.insert(*key, write.as_ref());
        }

        let mut len = self.log_len;
        let mut count = self.writes.len();
        for (key, write) in overrides {
            if let Some(existing) = self.writes.get(key) {
                len -= existing.log_len(key);
                count -= 1;
            }
            if let Some(write) = write {
                len += write.log_len(key);
                count += 1;
            }
        }

        if count == 0 {
            0
        } else {
            len + COMMIT_LEN
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::LogRecord;

    fn create_txn() -> Transaction {
        Transaction::new(TransactionId::new(1))
    }

    #[test]
    fn new_transaction_is_empty() {
        let txn = create_txn();
        assert!(txn.is_empty());
        assert_eq!(txn.commit_len(), 0);
        assert_eq!(txn.id(), TransactionId::new(1));
    }

    #[test]
    fn later_write_replaces_earlier() {
        let mut txn = create_txn();
        txn.record("k", PendingWrite::Put(b"first".to_vec()));
        txn.record("k", PendingWrite::Delete);

        assert_eq!(txn.write_count(), 1);
        assert_eq!(txn.get("k"), Some(&PendingWrite::Delete));
    }

    #[test]
    fn commit_len_matches_log_records() {
        let mut txn = create_txn();
        txn.record("a", PendingWrite::Put(b"ACGT,x,0".to_vec()));
        txn.record("a", PendingWrite::Put(b"ACGTT,x;y,0".to_vec()));
        txn.record("b", PendingWrite::Delete);

        let txid = txn.id();
        let expected: usize = [
            LogRecord::Put {
                txid,
                key: "a".into(),
                value: b"ACGTT,x;y,0".to_vec(),
            },
            LogRecord::Delete {
                txid,
                key: "b".into(),
            },
            LogRecord::Commit { txid },
        ]
        .iter()
        .map(LogRecord::encoded_len)
        .sum();

        assert_eq!(txn.commit_len(), expected as u64);
    }

    #[test]
    fn commit_len_after_combines_changes() {
        let mut txn = create_txn();
        txn.record("a", PendingWrite::Put(b"ab,x,0".to_vec()));

        let put = PendingWrite::Put(b"ab,x;y,0".to_vec());
        let mut combined = create_txn();
        combined.record("a", put.clone());
        combined.record("b", PendingWrite::Delete);

        let changes = [("a", Some(put)), ("b", Some(PendingWrite::Delete))];
        assert_eq!(txn.commit_len_after(&changes), combined.commit_len());
        assert_eq!(txn.commit_len_after(&[("a", None)]), 0);
        assert_eq!(txn.commit_len_after(&[]), txn.commit_len());
    }

    #[test]
    fn commit_len_with_accounts_for_replacement() {
        let mut txn = create_txn();
        txn.record("a", PendingWrite::Put(vec![0; 100]));

        let write = PendingWrite::Put(vec![0; 10]);
        let projected = txn.commit_len_with("a", &write);
        txn.record("a", write);
        assert_eq!(projected, txn.commit_len());
    }

    #[test]
    fn discard_drops_write() {
        let mut txn = create_txn();
        txn.record("a", PendingWrite::Put(b"v".to_vec()));

        assert!(txn.discard("a"));
        assert!(!txn.discard("a"));
        assert!(txn.is_empty());
        assert_eq!(txn.commit_len(), 0);
    }
}
