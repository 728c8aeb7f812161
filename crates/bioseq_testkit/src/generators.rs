//! Property-based test generators using proptest.
//!
//! Generated strings never contain the record delimiters `,` and `;`, so
//! every generated record survives an encode/decode round trip.

use bioseq_core::SequenceRecord;
use proptest::prelude::*;
use std::collections::BTreeSet;

/// Strategy for sequences over a small alphabet, so duplicates are common.
pub fn sequence_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[ACGT]{1,6}").expect("Invalid regex")
}

/// Strategy for class names.
pub fn class_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,7}").expect("Invalid regex")
}

/// Strategy for class sets, possibly empty.
pub fn classes_strategy() -> impl Strategy<Value = BTreeSet<String>> {
    prop::collection::btree_set(class_strategy(), 0..4)
}

/// Strategy for labels.
pub fn label_strategy() -> impl Strategy<Value = i64> {
    prop_oneof![
        3 => 0..2i64,
        1 => any::<i64>(),
    ]
}

/// Strategy for delimiter-free records.
pub fn record_strategy() -> impl Strategy<Value = SequenceRecord> {
    (sequence_strategy(), classes_strategy(), label_strategy()).prop_map(
        |(sequence, classes, label)| SequenceRecord {
            sequence,
            classes,
            label,
        },
    )
}

/// Strategy for store keys.
pub fn key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Za-z0-9_|.]{1,12}").expect("Invalid regex")
}

/// A dataset operation for model-based tests.
#[derive(Debug, Clone)]
pub enum DatasetOperation {
    /// Add a record with merging.
    Add {
        /// Key to store under.
        key: String,
        /// Record to add.
        record: SequenceRecord,
    },
    /// Remove a key.
    Remove {
        /// Key to remove.
        key: String,
    },
    /// Commit buffered additions.
    Commit,
}

/// Strategy for dataset operations over a small key space.
pub fn dataset_operation_strategy() -> impl Strategy<Value = DatasetOperation> {
    let key = || prop::string::string_regex("k[0-7]").expect("Invalid regex");
    prop_oneof![
        4 => (key(), record_strategy())
            .prop_map(|(key, record)| DatasetOperation::Add { key, record }),
        1 => key().prop_map(|key| DatasetOperation::Remove { key }),
        1 => Just(DatasetOperation::Commit),
    ]
}

/// Strategy for a sequence of operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<DatasetOperation>> {
    prop::collection::vec(dataset_operation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
