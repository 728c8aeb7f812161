//! Deduplicating sequence dataset.

use crate::config::StoreConfig;
use crate::error::{CoreError, CoreResult};
use crate::fasta::FastaSource;
use crate::index::{DuplicateIndex, SequenceHasher, Sha256Hasher};
use crate::record::SequenceRecord;
use crate::store::{CompactionResult, Store, StoreStats};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info, warn};

/// What [`SequenceDataset::add_sequence`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// The record was stored as given.
    Inserted,
    /// The record was merged with a stored duplicate.
    Merged {
        /// Key the duplicate was stored under. It no longer exists unless
        /// it equals the new key.
        retired_key: String,
    },
}

/// Counts from one ingestion run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// Pairs read from the source.
    pub read: usize,
    /// Records stored without merging.
    pub inserted: usize,
    /// Records merged into a stored duplicate.
    pub merged: usize,
}

/// A store of sequence records that never holds the same sequence twice.
///
/// Records are kept in a [`Store`] as encoded text. An in-memory
/// [`DuplicateIndex`], rebuilt at open, finds stored records with the same
/// sequence so that new records can be merged into them instead of stored
/// twice.
///
/// # Example
///
/// ```rust,no_run
/// use bioseq_core::{SequenceDataset, SequenceRecord, StoreConfig};
///
/// let mut dataset = SequenceDataset::open(StoreConfig::writable("data/sequence.db"))?;
/// dataset.add_sequence("1", SequenceRecord::new("MKV", ["toxin"], 1), true)?;
/// dataset.add_sequence("2", SequenceRecord::new("MKV", ["venom"], 1), true)?;
///
/// let record = dataset.get_sequence("2")?.unwrap();
/// assert_eq!(record.classes.len(), 2);
/// assert!(dataset.get_sequence("1")?.is_none());
/// dataset.close()?;
/// # Ok::<(), bioseq_core::CoreError>(())
/// ```
pub struct SequenceDataset<H = Sha256Hasher> {
    store: Store,
    index: DuplicateIndex<H>,
}

impl SequenceDataset<Sha256Hasher> {
    /// Creates an unopened dataset. Call [`SequenceDataset::init`] before use.
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        Self::with_hasher(config, Sha256Hasher)
    }

    /// Creates and opens a dataset.
    ///
    /// # Errors
    ///
    /// See [`SequenceDataset::init`].
    pub fn open(config: StoreConfig) -> CoreResult<Self> {
        let mut dataset = Self::new(config);
        dataset.init()?;
        Ok(dataset)
    }

    /// Opens an empty dataset held in memory.
    pub fn open_in_memory(config: StoreConfig) -> CoreResult<Self> {
        Self::from_store(Store::open_in_memory(config)?, Sha256Hasher)
    }
}

impl<H: SequenceHasher> SequenceDataset<H> {
    /// Creates an unopened dataset that buckets sequences with `hasher`.
    pub fn with_hasher(config: StoreConfig, hasher: H) -> Self {
        Self {
            store: Store::new(config),
            index: DuplicateIndex::with_hasher(hasher),
        }
    }

    /// Wraps an open store and indexes its contents.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MalformedRecord`] if a stored value is not a
    /// record, or the store's own errors.
    pub fn from_store(store: Store, hasher: H) -> CoreResult<Self> {
        let mut dataset = Self {
            store,
            index: DuplicateIndex::with_hasher(hasher),
        };
        dataset.rebuild_index()?;
        Ok(dataset)
    }

    /// Opens the store and builds the duplicate index from its contents.
    ///
    /// # Errors
    ///
    /// Returns the store's open errors, or
    /// [`CoreError::MalformedRecord`] if a stored value is not a record.
    pub fn init(&mut self) -> CoreResult<()> {
        self.store.init()?;
        self.rebuild_index()
    }

    fn rebuild_index(&mut self) -> CoreResult<()> {
        let mut entries = Vec::new();
        for key in self.store.keys()? {
            if let Some(record) = self.get_sequence(&key)? {
                entries.push((key, record.sequence));
            }
        }
        self.index.build(entries);

        debug!(
            entries = self.index.len(),
            buckets = self.index.bucket_count(),
            "built duplicate index"
        );
        Ok(())
    }

    /// Stores `record` under `key`.
    ///
    /// With `merge_duplicates`, a stored record with the same sequence is
    /// merged into the new one: classes are united and the old key is
    /// deleted. Without it, the record is stored as given.
    ///
    /// Writing is buffered until [`SequenceDataset::commit`], except that
    /// retiring a merged key commits at once.
    ///
    /// # Errors
    ///
    /// - [`CoreError::ConflictingLabel`] if the duplicate has a different
    ///   label; nothing is changed
    /// - [`CoreError::ReadOnly`] on read-only datasets; nothing is changed
    /// - [`CoreError::MapFull`] if the write, or the commit that retires a
    ///   merged key, would not fit; nothing is changed
    /// - [`CoreError::MalformedRecord`] if a stored candidate does not
    ///   decode
    pub fn add_sequence(
        &mut self,
        key: &str,
        record: SequenceRecord,
        merge_duplicates: bool,
    ) -> CoreResult<AddOutcome> {
        if self.store.is_read_only()? {
            return Err(CoreError::ReadOnly);
        }

        let previous = self.get_sequence(key)?;
        let duplicate = if merge_duplicates {
            self.get_duplicate(&record.sequence)?
        } else {
            None
        };

        let (record, retired) = match duplicate {
            Some((existing_key, existing)) => {
                if existing.label != record.label {
                    return Err(CoreError::ConflictingLabel {
                        existing_key,
                        existing: existing.label,
                        incoming: record.label,
                    });
                }
                (record.merged_with(&existing), Some((existing_key, existing)))
            }
            None => (record, None),
        };

        let encoded = record.encode();
        let retiring = retired
            .as_ref()
            .map(|(retired_key, _)| retired_key.as_str())
            .filter(|retired_key| *retired_key != key);
        let removals: Vec<&str> = retiring.into_iter().collect();
        self.store
            .check_capacity(&[(key, encoded.as_bytes())], &removals)?;

        let pending = self.store.pending_write(key)?;
        self.store.write(key, encoded.as_bytes())?;
        if let Some(retired_key) = retiring {
            if let Err(e) = self.store.remove(retired_key) {
                if let Err(undo) = self.store.restore_pending(key, pending) {
                    warn!(key, error = %undo, "failed to undo write after failed merge");
                }
                return Err(e);
            }
        }

        if let Some(previous) = &previous {
            self.index.remove(key, &previous.sequence);
        }
        self.index.insert(key, &record.sequence);

        let Some((retired_key, existing)) = retired else {
            return Ok(AddOutcome::Inserted);
        };
        if retired_key != key {
            self.index.remove(&retired_key, &existing.sequence);
        }
        debug!(
            key,
            retired_key = %retired_key,
            classes = record.classes.len(),
            "merged duplicate sequence"
        );
        Ok(AddOutcome::Merged { retired_key })
    }

    /// Returns the record stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MalformedRecord`] if the stored value is not a
    /// record.
    pub fn get_sequence(&self, key: &str) -> CoreResult<Option<SequenceRecord>> {
        self.store
            .read(key)?
            .map(|bytes| SequenceRecord::decode_bytes(&bytes))
            .transpose()
    }

    /// Deletes the record under `key` and commits. Returns whether one
    /// existed.
    pub fn remove_sequence(&mut self, key: &str) -> CoreResult<bool> {
        let Some(record) = self.get_sequence(key)? else {
            return Ok(false);
        };
        self.store.remove(key)?;
        self.index.remove(key, &record.sequence);
        Ok(true)
    }

    /// Returns whether a record with this sequence is stored.
    ///
    /// Accepts a sequence string or a [`SequenceRecord`].
    pub fn contains(&self, item: impl AsRef<str>) -> CoreResult<bool> {
        Ok(self.get_duplicate(item)?.is_some())
    }

    /// Returns the key and record stored with this sequence.
    ///
    /// Accepts a sequence string or a [`SequenceRecord`].
    pub fn get_duplicate(
        &self,
        item: impl AsRef<str>,
    ) -> CoreResult<Option<(String, SequenceRecord)>> {
        self.index
            .find_duplicate(item.as_ref(), |key| self.get_sequence(key))
    }

    /// Returns all keys in order.
    pub fn keys(&self) -> CoreResult<Vec<String>> {
        self.store.keys()
    }

    /// Returns the number of stored records.
    pub fn len(&self) -> CoreResult<usize> {
        self.store.count()
    }

    /// Returns whether the dataset is empty.
    pub fn is_empty(&self) -> CoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Iterates over `(key, record)` pairs in key order.
    ///
    /// Keys are listed up front; records are read lazily.
    pub fn iter(&self) -> CoreResult<impl Iterator<Item = CoreResult<(String, SequenceRecord)>> + '_> {
        let keys = self.keys()?;
        Ok(keys.into_iter().filter_map(move |key| {
            self.get_sequence(&key)
                .map(|record| record.map(|record| (key, record)))
                .transpose()
        }))
    }

    /// Adds every `(identifier, sequence)` pair from `source`.
    ///
    /// `classify` and `label` are called once per identifier to build the
    /// record, which is stored under the identifier. Stops at the first
    /// error; records added before it stay buffered.
    pub fn ingest<I, C, L>(
        &mut self,
        source: I,
        classify: C,
        label: L,
        merge_duplicates: bool,
    ) -> CoreResult<IngestSummary>
    where
        I: IntoIterator<Item = CoreResult<(String, String)>>,
        C: Fn(&str) -> BTreeSet<String>,
        L: Fn(&str) -> i64,
    {
        let mut summary = IngestSummary::default();

        for item in source {
            let (identifier, sequence) = item?;
            summary.read += 1;

            let record = SequenceRecord {
                sequence,
                classes: classify(&identifier),
                label: label(&identifier),
            };
            match self.add_sequence(&identifier, record, merge_duplicates)? {
                AddOutcome::Inserted => summary.inserted += 1,
                AddOutcome::Merged { .. } => summary.merged += 1,
            }
        }

        info!(
            read = summary.read,
            inserted = summary.inserted,
            merged = summary.merged,
            "ingested sequences"
        );
        Ok(summary)
    }

    /// Adds every record of a FASTA file. See [`SequenceDataset::ingest`].
    pub fn ingest_fasta<C, L>(
        &mut self,
        path: impl AsRef<Path>,
        classify: C,
        label: L,
        merge_duplicates: bool,
    ) -> CoreResult<IngestSummary>
    where
        C: Fn(&str) -> BTreeSet<String>,
        L: Fn(&str) -> i64,
    {
        let source = FastaSource::open(path)?;
        self.ingest(source, classify, label, merge_duplicates)
    }

    /// Commits buffered additions.
    pub fn commit(&mut self) -> CoreResult<()> {
        self.store.commit()
    }

    /// Commits and closes the store. The index is discarded.
    pub fn close(&mut self) -> CoreResult<()> {
        self.store.close()?;
        self.index.clear();
        Ok(())
    }

    /// Rewrites the store's log to hold only live records.
    pub fn compact(&mut self) -> CoreResult<CompactionResult> {
        self.store.compact()
    }

    /// Returns store statistics.
    pub fn stats(&self) -> CoreResult<StoreStats> {
        self.store.stats()
    }

    /// Returns the duplicate index.
    #[must_use]
    pub fn index(&self) -> &DuplicateIndex<H> {
        &self.index
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }
}

impl<H> std::fmt::Debug for SequenceDataset<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequenceDataset")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
