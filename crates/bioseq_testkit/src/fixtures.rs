//! Test fixtures and dataset helpers.
//!
//! Provides convenience functions for setting up test datasets
//! and common test scenarios.

use bioseq_core::{SequenceDataset, StoreConfig};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A test dataset with automatic cleanup.
pub struct TestDataset {
    /// The dataset instance.
    pub dataset: SequenceDataset,
    /// Keeps the store directory alive.
    temp_dir: Option<TempDir>,
}

impl TestDataset {
    /// Creates an in-memory dataset.
    pub fn memory() -> Self {
        Self {
            dataset: SequenceDataset::open_in_memory(StoreConfig::default())
                .expect("Failed to open in-memory dataset"),
            temp_dir: None,
        }
    }

    /// Creates a read-write dataset in a fresh temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = StoreConfig::writable(temp_dir.path()).sync_on_commit(false);
        let dataset = SequenceDataset::open(config).expect("Failed to open file dataset");

        Self {
            dataset,
            temp_dir: Some(temp_dir),
        }
    }

    /// Returns the store directory if file-based, `None` if in-memory.
    pub fn path(&self) -> Option<&Path> {
        self.temp_dir.as_ref().map(TempDir::path)
    }

    /// Closes the dataset and reopens the same directory.
    ///
    /// # Panics
    ///
    /// Panics for in-memory datasets.
    pub fn reopen(&mut self, read_only: bool) {
        let path = self
            .path()
            .expect("Only file datasets can be reopened")
            .to_path_buf();
        self.dataset.close().expect("Failed to close dataset");

        let config = StoreConfig::writable(path)
            .read_only(read_only)
            .sync_on_commit(false);
        self.dataset = SequenceDataset::open(config).expect("Failed to reopen dataset");
    }
}

impl std::ops::Deref for TestDataset {
    type Target = SequenceDataset;

    fn deref(&self) -> &Self::Target {
        &self.dataset
    }
}

impl std::ops::DerefMut for TestDataset {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.dataset
    }
}

/// Runs a test with a temporary in-memory dataset.
pub fn with_memory_dataset<F, R>(f: F) -> R
where
    F: FnOnce(&mut SequenceDataset) -> R,
{
    let mut test = TestDataset::memory();
    f(&mut test.dataset)
}

/// Runs a test with a dataset in a temporary directory.
pub fn with_file_dataset<F, R>(f: F) -> R
where
    F: FnOnce(&mut SequenceDataset, &Path) -> R,
{
    let mut test = TestDataset::file();
    let path = test
        .path()
        .expect("File dataset should have a path")
        .to_path_buf();
    f(&mut test.dataset, &path)
}

/// Writes `records` as a FASTA file in `dir` and returns its path.
///
/// Sequences are wrapped at 60 residues per line.
pub fn write_fasta(dir: &Path, name: &str, records: &[(&str, &str)]) -> PathBuf {
    let path = dir.join(name);
    let mut file = std::fs::File::create(&path).expect("Failed to create FASTA file");
    for (header, sequence) in records {
        writeln!(file, ">{header}").expect("Failed to write header");
        for line in sequence.as_bytes().chunks(60) {
            file.write_all(line).expect("Failed to write sequence");
            file.write_all(b"\n").expect("Failed to write newline");
        }
    }
    path
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;
    use bioseq_core::SequenceRecord;

    /// Creates a dataset holding `count` distinct committed sequences.
    ///
    /// Key `i` holds a sequence unique to `i`, class `c{i % 3}` and label
    /// `i % 2`.
    pub fn populated_dataset(count: usize) -> TestDataset {
        let mut test = TestDataset::memory();
        for i in 0..count {
            let record = SequenceRecord::new(
                unique_sequence(i),
                [format!("c{}", i % 3)],
                (i % 2) as i64,
            );
            test.add_sequence(&i.to_string(), record, true)
                .expect("Failed to add sequence");
        }
        test.commit().expect("Failed to commit");
        test
    }

    /// Returns a protein-like sequence that differs for every `i`.
    pub fn unique_sequence(i: usize) -> String {
        const RESIDUES: &[u8] = b"ACDEFGHIKLMNPQRSTVWY";
        let mut sequence = String::from("M");
        let mut n = i;
        loop {
            sequence.push(char::from(RESIDUES[n % RESIDUES.len()]));
            n /= RESIDUES.len();
            if n == 0 {
                break;
            }
        }
        sequence
    }
}
