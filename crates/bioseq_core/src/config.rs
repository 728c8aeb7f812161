//! Store configuration.

use std::path::{Path, PathBuf};

/// Default maximum store size: 30 MiB.
pub const DEFAULT_MAP_SIZE: u64 = 31_457_280;

/// Configuration for opening a sequence store.
///
/// `map_size` is fixed for the lifetime of a session. Commits that would
/// grow the log past it fail with
/// [`CoreError::MapFull`](crate::CoreError::MapFull).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Location of the store: a directory, or a single log file.
    pub path: PathBuf,

    /// Open without taking the write lock and reject all mutations.
    pub read_only: bool,

    /// Maximum size of the log in bytes.
    pub map_size: u64,

    /// Whether to create the store if it doesn't exist (read-write only).
    pub create_if_missing: bool,

    /// Whether to fsync the log on every commit (safer but slower).
    pub sync_on_commit: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/sequence.db"),
            read_only: true,
            map_size: DEFAULT_MAP_SIZE,
            create_if_missing: true,
            sync_on_commit: true,
        }
    }
}

impl StoreConfig {
    /// Creates a read-only configuration for the store at `path`.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Creates a read-write configuration for the store at `path`.
    #[must_use]
    pub fn writable(path: impl AsRef<Path>) -> Self {
        Self::new(path).read_only(false)
    }

    /// Sets whether the store is opened read-only.
    #[must_use]
    pub const fn read_only(mut self, value: bool) -> Self {
        self.read_only = value;
        self
    }

    /// Sets the maximum log size in bytes.
    #[must_use]
    pub const fn map_size(mut self, size: u64) -> Self {
        self.map_size = size;
        self
    }

    /// Sets whether to create the store if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to sync the log on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }
}
