//! Benchmark utilities.

use bioseq_core::{SequenceRecord, StoreConfig};
use rand::seq::SliceRandom;
use rand::Rng;

const RESIDUES: &[u8] = b"ACDEFGHIKLMNPQRSTVWY";

/// Generate a random protein sequence of the specified length.
pub fn random_sequence(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| char::from(*RESIDUES.choose(&mut rng).unwrap_or(&b'A')))
        .collect()
}

/// Generate a record with a random sequence and `class_count` classes.
pub fn random_record(len: usize, class_count: usize) -> SequenceRecord {
    let mut rng = rand::thread_rng();
    SequenceRecord::new(
        random_sequence(len),
        (0..class_count).map(|i| format!("class{i}")),
        rng.gen_range(0..2),
    )
}

/// Generate `count` keyed records where roughly `duplicate_ratio` of them
/// repeat an earlier sequence with the same label.
pub fn generate_records(
    count: usize,
    len: usize,
    duplicate_ratio: f64,
) -> Vec<(String, SequenceRecord)> {
    let mut rng = rand::thread_rng();
    let mut records: Vec<(String, SequenceRecord)> = Vec::with_capacity(count);

    for i in 0..count {
        let record = match records.choose(&mut rng) {
            Some((_, earlier)) if rng.gen_bool(duplicate_ratio) => {
                SequenceRecord::new(earlier.sequence.clone(), [format!("dup{i}")], earlier.label)
            }
            _ => random_record(len, 2),
        };
        records.push((format!("seq{i}"), record));
    }
    records
}

/// A writable configuration that never runs out of space.
pub fn unbounded_config() -> StoreConfig {
    StoreConfig::default()
        .read_only(false)
        .map_size(u64::MAX)
        .sync_on_commit(false)
}
