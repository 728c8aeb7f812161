//! On-disk layout and locking.
//!
//! A store lives either in a directory or in a single file, decided by
//! whether the configured path is an existing directory:
//!
//! ```text
//! <dir>/                  <file>
//! ├─ data.log             <file>-lock
//! └─ LOCK
//! ```
//!
//! Read-write sessions hold an exclusive advisory lock on the lock file for
//! their whole lifetime. Read-only sessions take no lock; the caller
//! asserts that no writer is active.

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

const LOG_FILE: &str = "data.log";
const LOCK_FILE: &str = "LOCK";
const LOCK_SUFFIX: &str = "-lock";
const COMPACT_SUFFIX: &str = ".compact";

/// Resolved file locations for one store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    log: PathBuf,
    lock: PathBuf,
}

impl StorePaths {
    /// Resolves the files for the store at `path`.
    #[must_use]
    pub fn resolve(path: &Path) -> Self {
        if path.is_dir() {
            Self {
                log: path.join(LOG_FILE),
                lock: path.join(LOCK_FILE),
            }
        } else {
            Self {
                log: path.to_path_buf(),
                lock: with_suffix(path, LOCK_SUFFIX),
            }
        }
    }

    /// Returns the transaction log path.
    #[must_use]
    pub fn log_path(&self) -> &Path {
        &self.log
    }

    /// Returns the lock file path.
    #[must_use]
    pub fn lock_path(&self) -> &Path {
        &self.lock
    }

    /// Returns the scratch path used while compacting.
    #[must_use]
    pub fn compact_path(&self) -> PathBuf {
        with_suffix(&self.log, COMPACT_SUFFIX)
    }

    /// Returns whether the log file exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.log.is_file()
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Exclusive write lock held for a read-write session.
///
/// Released when dropped.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
}

impl StoreLock {
    /// Acquires the lock without blocking.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::StoreLocked`] if another session holds it.
    pub fn acquire(paths: &StorePaths) -> CoreResult<Self> {
        if let Some(parent) = paths.lock.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&paths.lock)?;

        if file.try_lock_exclusive().is_err() {
            return Err(CoreError::StoreLocked);
        }

        Ok(Self { file })
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        // closing the handle would release it too; unlock explicitly so the
        // next session in this process can lock immediately
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn directory_layout() {
        let temp = tempdir().unwrap();
        let paths = StorePaths::resolve(temp.path());

        assert_eq!(paths.log_path(), temp.path().join("data.log"));
        assert_eq!(paths.lock_path(), temp.path().join("LOCK"));
        assert_eq!(paths.compact_path(), temp.path().join("data.log.compact"));
        assert!(!paths.exists());
    }

    #[test]
    fn file_layout() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("db.lmdb");
        let paths = StorePaths::resolve(&path);

        assert_eq!(paths.log_path(), path);
        assert_eq!(paths.lock_path(), temp.path().join("db.lmdb-lock"));
    }

    #[test]
    fn second_lock_fails() {
        let temp = tempdir().unwrap();
        let paths = StorePaths::resolve(&temp.path().join("db"));

        let lock = StoreLock::acquire(&paths).unwrap();
        assert!(matches!(
            StoreLock::acquire(&paths),
            Err(CoreError::StoreLocked)
        ));

        drop(lock);
        assert!(StoreLock::acquire(&paths).is_ok());
    }

    #[test]
    fn lock_creates_parent_directories() {
        let temp = tempdir().unwrap();
        let paths = StorePaths::resolve(&temp.path().join("nested").join("db"));

        StoreLock::acquire(&paths).unwrap();
        assert!(paths.lock_path().exists());
    }
}
