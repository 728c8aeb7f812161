//! Cross-crate integration test helpers.
//!
//! [`IntegrationHarness`] drives a dataset alongside a plain in-memory
//! model of the expected contents, so tests can check the dataset against
//! the model after every step.

use crate::fixtures::TestDataset;
use crate::generators::DatasetOperation;
use bioseq_core::{CoreError, SequenceRecord};
use std::collections::BTreeMap;

/// A dataset plus the contents it should have.
pub struct IntegrationHarness {
    /// The dataset under test.
    pub dataset: TestDataset,
    expected: BTreeMap<String, SequenceRecord>,
}

impl IntegrationHarness {
    /// Creates a harness over an in-memory dataset.
    pub fn memory() -> Self {
        Self {
            dataset: TestDataset::memory(),
            expected: BTreeMap::new(),
        }
    }

    /// Creates a harness over a dataset in a temporary directory.
    pub fn file() -> Self {
        Self {
            dataset: TestDataset::file(),
            expected: BTreeMap::new(),
        }
    }

    /// Adds a record with merging and updates the model.
    ///
    /// Returns the dataset's error if the add was rejected; the model is
    /// then left unchanged.
    pub fn add(&mut self, key: &str, record: SequenceRecord) -> Result<(), CoreError> {
        let duplicate = self
            .expected
            .iter()
            .find(|(_, existing)| existing.sequence == record.sequence)
            .map(|(k, existing)| (k.clone(), existing.clone()));

        let result = self.dataset.add_sequence(key, record.clone(), true);

        match duplicate {
            Some((_, existing)) if existing.label != record.label => {
                assert!(
                    matches!(result, Err(CoreError::ConflictingLabel { .. })),
                    "expected a label conflict for {key}, got {result:?}"
                );
                return result.map(|_| ());
            }
            Some((existing_key, existing)) => {
                result.expect("Failed to merge sequence");
                let mut merged = record;
                merged.classes.extend(existing.classes);
                self.expected.remove(&existing_key);
                self.expected.insert(key.to_owned(), merged);
            }
            None => {
                result.expect("Failed to add sequence");
                self.expected.insert(key.to_owned(), record);
            }
        }
        Ok(())
    }

    /// Removes a key and updates the model.
    pub fn remove(&mut self, key: &str) {
        let removed = self
            .dataset
            .remove_sequence(key)
            .expect("Failed to remove sequence");
        assert_eq!(removed, self.expected.remove(key).is_some());
    }

    /// Applies a generated operation. Label conflicts are expected outcomes.
    pub fn apply(&mut self, op: &DatasetOperation) {
        match op {
            DatasetOperation::Add { key, record } => {
                let _ = self.add(key, record.clone());
            }
            DatasetOperation::Remove { key } => self.remove(key),
            DatasetOperation::Commit => self.dataset.commit().expect("Failed to commit"),
        }
    }

    /// Closes and reopens a file dataset read-write.
    pub fn reopen(&mut self) {
        self.dataset.reopen(false);
    }

    /// Checks every key, record and duplicate lookup against the model.
    pub fn verify_all(&self) {
        let keys = self.dataset.keys().expect("Failed to list keys");
        let expected_keys: Vec<_> = self.expected.keys().cloned().collect();
        assert_eq!(keys, expected_keys);

        for (key, expected) in &self.expected {
            let actual = self
                .dataset
                .get_sequence(key)
                .expect("Failed to get sequence");
            let actual = actual.unwrap_or_else(|| panic!("missing record for {key}"));
            assert_eq!(actual.sequence, expected.sequence, "sequence mismatch for {key}");
            assert_eq!(actual.classes, expected.classes, "classes mismatch for {key}");
            assert_eq!(actual.label, expected.label, "label mismatch for {key}");

            let (found_key, _) = self
                .dataset
                .get_duplicate(&expected.sequence)
                .expect("Failed to look up duplicate")
                .expect("Stored sequence should be found");
            assert_eq!(&found_key, key);
        }
    }

    /// Returns the expected contents.
    pub fn expected(&self) -> &BTreeMap<String, SequenceRecord> {
        &self.expected
    }
}
