//! Dataset properties checked with generated input.

use crate::fixtures::TestDataset;
use crate::generators::*;
use crate::integration::IntegrationHarness;
use bioseq_core::{CoreError, SequenceRecord};
use proptest::prelude::*;

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn encoded_records_decode_to_same_contents(record in record_strategy()) {
        let decoded = SequenceRecord::decode(&record.encode()).unwrap();
        prop_assert_eq!(&decoded.sequence, &record.sequence);
        prop_assert_eq!(&decoded.classes, &record.classes);
        prop_assert_eq!(decoded.label, record.label);
    }

    #[test]
    fn same_label_adds_never_grow_the_dataset(
        sequence in sequence_strategy(),
        label in label_strategy(),
        class_sets in prop::collection::vec(classes_strategy(), 1..6),
    ) {
        let mut test = TestDataset::memory();
        let mut union = std::collections::BTreeSet::new();

        for (i, classes) in class_sets.iter().enumerate() {
            union.extend(classes.iter().cloned());
            let record = SequenceRecord {
                sequence: sequence.clone(),
                classes: classes.clone(),
                label,
            };
            test.add_sequence(&format!("k{i}"), record, true).unwrap();
            prop_assert_eq!(test.len().unwrap(), 1);
        }

        let (_, stored) = test.get_duplicate(&sequence).unwrap().unwrap();
        prop_assert_eq!(stored.classes, union);
    }

    #[test]
    fn conflicting_label_changes_nothing(
        first in record_strategy(),
        others in prop::collection::vec(record_strategy(), 0..5),
        classes in classes_strategy(),
    ) {
        let mut test = TestDataset::memory();
        test.add_sequence("first", first.clone(), true).unwrap();
        for (i, record) in others.into_iter().enumerate() {
            let _ = test.add_sequence(&format!("other{i}"), record, true);
        }
        test.commit().unwrap();

        let Some((holder, stored)) = test.get_duplicate(&first.sequence).unwrap() else {
            return Err(TestCaseError::fail("first sequence should be stored"));
        };
        let before: Vec<_> = test.iter().unwrap().collect::<Result<_, _>>().unwrap();

        let conflicting = SequenceRecord {
            sequence: first.sequence.clone(),
            classes,
            label: stored.label.wrapping_add(1),
        };
        let result = test.add_sequence("incoming", conflicting, true);
        let is_conflict = matches!(result, Err(CoreError::ConflictingLabel { .. }));
        prop_assert!(is_conflict);

        let after: Vec<_> = test.iter().unwrap().collect::<Result<_, _>>().unwrap();
        prop_assert_eq!(before.len(), after.len());
        for ((key_a, a), (key_b, b)) in before.iter().zip(&after) {
            prop_assert_eq!(key_a, key_b);
            prop_assert_eq!(&a.classes, &b.classes);
            prop_assert_eq!(a.label, b.label);
        }
        let holder_now = test.get_duplicate(&first.sequence).unwrap().map(|(k, _)| k);
        prop_assert_eq!(holder_now, Some(holder));
    }

    #[test]
    fn removed_keys_are_unreachable(records in prop::collection::vec(record_strategy(), 1..8)) {
        let mut test = TestDataset::memory();
        for (i, record) in records.iter().enumerate() {
            let _ = test.add_sequence(&format!("k{i}"), record.clone(), true);
        }

        for key in test.keys().unwrap() {
            let record = test.get_sequence(&key).unwrap().unwrap();
            prop_assert!(test.remove_sequence(&key).unwrap());

            prop_assert!(test.get_sequence(&key).unwrap().is_none());
            let found = test.get_duplicate(&record.sequence).unwrap().map(|(k, _)| k);
            prop_assert_ne!(found, Some(key));
        }
        prop_assert!(test.is_empty().unwrap());
    }

    #[test]
    fn dataset_matches_model(ops in operation_sequence_strategy(1, 40)) {
        let mut harness = IntegrationHarness::memory();
        for op in &ops {
            harness.apply(op);
        }
        harness.verify_all();
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 8, ..PropTestConfig::quick().to_proptest_config() })]

    #[test]
    fn reopened_dataset_matches_model(ops in operation_sequence_strategy(1, 25)) {
        let mut harness = IntegrationHarness::file();
        for op in &ops {
            harness.apply(op);
        }
        harness.reopen();
        harness.verify_all();
    }
}
