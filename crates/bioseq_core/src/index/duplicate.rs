//! Content-addressed duplicate index.

use crate::error::CoreResult;
use crate::index::hasher::{SequenceHasher, Sha256Hasher};
use crate::record::SequenceRecord;
use crate::types::ContentHash;
use std::collections::HashMap;

/// Maps sequence hashes to the keys stored under them.
///
/// Buckets hold candidates only. [`DuplicateIndex::find_duplicate`]
/// resolves each candidate through the caller and compares sequences, so
/// hash collisions never produce false duplicates.
///
/// The index lives in memory. It is rebuilt from the store with
/// [`DuplicateIndex::build`] when a dataset opens.
#[derive(Debug)]
pub struct DuplicateIndex<H = Sha256Hasher> {
    hasher: H,
    buckets: HashMap<ContentHash, Vec<String>>,
    count: usize,
}

impl DuplicateIndex<Sha256Hasher> {
    /// Creates an empty index with the SHA-256 hasher.
    #[must_use]
    pub fn new() -> Self {
        Self::with_hasher(Sha256Hasher)
    }
}

impl Default for DuplicateIndex<Sha256Hasher> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: SequenceHasher> DuplicateIndex<H> {
    /// Creates an empty index with a custom hasher.
    pub fn with_hasher(hasher: H) -> Self {
        Self {
            hasher,
            buckets: HashMap::new(),
            count: 0,
        }
    }

    /// Replaces the contents with `(key, sequence)` pairs.
    pub fn build<I, K, S>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, S)>,
        K: Into<String>,
        S: AsRef<str>,
    {
        self.clear();
        for (key, sequence) in entries {
            self.insert(key, sequence.as_ref());
        }
    }

    /// Hashes `sequence` with this index's hasher.
    pub fn hash(&self, sequence: &str) -> ContentHash {
        self.hasher.hash(sequence)
    }

    /// Finds a stored record whose sequence equals `sequence`.
    ///
    /// `resolve` loads the record for a candidate key; candidates it
    /// reports missing are skipped. Returns the first match in bucket
    /// order.
    ///
    /// # Errors
    ///
    /// Propagates errors from `resolve`.
    pub fn find_duplicate<F>(
        &self,
        sequence: &str,
        mut resolve: F,
    ) -> CoreResult<Option<(String, SequenceRecord)>>
    where
        F: FnMut(&str) -> CoreResult<Option<SequenceRecord>>,
    {
        let Some(bucket) = self.buckets.get(&self.hash(sequence)) else {
            return Ok(None);
        };

        for key in bucket {
            if let Some(record) = resolve(key)? {
                if record == *sequence {
                    return Ok(Some((key.clone(), record)));
                }
            }
        }
        Ok(None)
    }

    /// Adds `key` to the bucket for `sequence`.
    ///
    /// Returns `false` if the key was already there.
    pub fn insert(&mut self, key: impl Into<String>, sequence: &str) -> bool {
        let key = key.into();
        let bucket = self.buckets.entry(self.hasher.hash(sequence)).or_default();
        if bucket.contains(&key) {
            return false;
        }
        bucket.push(key);
        self.count += 1;
        true
    }

    /// Removes `key` from the bucket for `sequence`.
    ///
    /// Returns `false` if it was not there.
    pub fn remove(&mut self, key: &str, sequence: &str) -> bool {
        let hash = self.hasher.hash(sequence);
        let Some(bucket) = self.buckets.get_mut(&hash) else {
            return false;
        };
        let Some(position) = bucket.iter().position(|k| k == key) else {
            return false;
        };

        bucket.remove(position);
        if bucket.is_empty() {
            self.buckets.remove(&hash);
        }
        self.count -= 1;
        true
    }

    /// Returns the candidate keys for `sequence`.
    #[must_use]
    pub fn candidates(&self, sequence: &str) -> &[String] {
        self.buckets
            .get(&self.hash(sequence))
            .map_or(&[], Vec::as_slice)
    }

    /// Returns the number of indexed keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns the number of non-empty buckets.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.buckets.clear();
        self.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    fn colliding() -> DuplicateIndex<impl Fn(&str) -> ContentHash> {
        DuplicateIndex::with_hasher(|_: &str| ContentHash(0))
    }

    fn store_of(records: &[(&str, SequenceRecord)]) -> HashMap<String, SequenceRecord> {
        records
            .iter()
            .map(|(k, r)| ((*k).to_owned(), r.clone()))
            .collect()
    }

    #[test]
    fn insert_is_idempotent() {
        let mut index = DuplicateIndex::new();
        assert!(index.insert("1", "ab"));
        assert!(!index.insert("1", "ab"));
        assert_eq!(index.len(), 1);
        assert_eq!(index.candidates("ab"), ["1"]);
    }

    #[test]
    fn remove_missing_is_noop() {
        let mut index = DuplicateIndex::new();
        assert!(!index.remove("1", "ab"));
        index.insert("1", "ab");
        assert!(!index.remove("2", "ab"));
        assert!(index.remove("1", "ab"));
        assert!(index.is_empty());
        assert_eq!(index.bucket_count(), 0);
    }

    #[test]
    fn find_duplicate_resolves_through_caller() {
        let records = store_of(&[("1", SequenceRecord::new("ab", ["a"], 0))]);
        let mut index = DuplicateIndex::new();
        index.insert("1", "ab");

        let found = index
            .find_duplicate("ab", |key| Ok(records.get(key).cloned()))
            .unwrap()
            .unwrap();
        assert_eq!(found.0, "1");
        assert_eq!(found.1.label, 0);

        assert!(index
            .find_duplicate("ba", |key| Ok(records.get(key).cloned()))
            .unwrap()
            .is_none());
    }

    #[test]
    fn collisions_are_resolved_by_equality() {
        let records = store_of(&[
            ("1", SequenceRecord::new("AAAA", ["x"], 0)),
            ("2", SequenceRecord::new("CCCC", ["y"], 1)),
        ]);
        let mut index = colliding();
        index.build([("1", "AAAA"), ("2", "CCCC")]);
        assert_eq!(index.bucket_count(), 1);

        let (key, record) = index
            .find_duplicate("CCCC", |key| Ok(records.get(key).cloned()))
            .unwrap()
            .unwrap();
        assert_eq!(key, "2");
        assert_eq!(record.label, 1);

        assert!(index
            .find_duplicate("GGGG", |key| Ok(records.get(key).cloned()))
            .unwrap()
            .is_none());
    }

    #[test]
    fn stale_candidates_are_skipped() {
        let mut index = colliding();
        index.insert("gone", "AAAA");
        index.insert("live", "AAAA");

        let (key, _) = index
            .find_duplicate("AAAA", |key| {
                Ok((key == "live").then(|| SequenceRecord::new("AAAA", ["x"], 0)))
            })
            .unwrap()
            .unwrap();
        assert_eq!(key, "live");
    }

    #[test]
    fn resolve_errors_propagate() {
        let mut index = DuplicateIndex::new();
        index.insert("1", "ab");

        let err = index
            .find_duplicate("ab", |_| Err(CoreError::malformed("junk", "bad")))
            .unwrap_err();
        assert!(matches!(err, CoreError::MalformedRecord { .. }));
    }

    #[test]
    fn build_replaces_contents() {
        let mut index = DuplicateIndex::new();
        index.insert("old", "TTTT");
        index.build(vec![("1".to_owned(), "ab".to_owned())]);

        assert_eq!(index.len(), 1);
        assert!(index.candidates("TTTT").is_empty());
    }
}
