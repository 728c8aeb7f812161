//! Crash simulation for recovery tests.
//!
//! [`CrashableBackend`] wraps a real backend and fails once a byte budget
//! is spent, writing the part of the failing append that fits. After the
//! crash every mutation fails, so the torn bytes stay in place exactly as a
//! killed process would leave them.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let backend = CrashableBackend::new(Box::new(FileBackend::open(&path)?));
//! let switch = backend.switch();
//! switch.crash_after(100);
//! let mut store = Store::with_backend(StoreConfig::writable(&path), Box::new(backend))?;
//! ```

use bioseq_storage::{StorageBackend, StorageError, StorageResult};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Crash state shared between a [`CrashableBackend`] and the test.
#[derive(Debug, Default)]
pub struct CrashSwitch {
    crash_after_bytes: AtomicUsize,
    bytes_written: AtomicUsize,
    crashed: AtomicBool,
}

impl CrashSwitch {
    /// Crash once `bytes` more bytes have been appended.
    pub fn crash_after(&self, bytes: usize) {
        let written = self.bytes_written.load(Ordering::SeqCst);
        self.crash_after_bytes
            .store(written.saturating_add(bytes), Ordering::SeqCst);
    }

    /// Returns whether the backend has crashed.
    pub fn has_crashed(&self) -> bool {
        self.crashed.load(Ordering::SeqCst)
    }

    /// Returns the bytes appended so far, torn writes included.
    pub fn bytes_written(&self) -> usize {
        self.bytes_written.load(Ordering::SeqCst)
    }
}

/// A storage backend wrapper that can simulate crashes.
pub struct CrashableBackend {
    inner: Box<dyn StorageBackend>,
    switch: Arc<CrashSwitch>,
}

impl CrashableBackend {
    /// Wraps `inner`. It never crashes until armed.
    pub fn new(inner: Box<dyn StorageBackend>) -> Self {
        let switch = CrashSwitch::default();
        switch.crash_after_bytes.store(usize::MAX, Ordering::SeqCst);
        Self {
            inner,
            switch: Arc::new(switch),
        }
    }

    /// Returns a handle for arming and inspecting the crash.
    pub fn switch(&self) -> Arc<CrashSwitch> {
        Arc::clone(&self.switch)
    }

    fn crashed_error(what: &str) -> StorageError {
        StorageError::Io(io::Error::new(
            io::ErrorKind::Other,
            format!("simulated crash: {what}"),
        ))
    }

    fn ensure_alive(&self, what: &str) -> StorageResult<()> {
        if self.switch.has_crashed() {
            return Err(Self::crashed_error(what));
        }
        Ok(())
    }
}

impl StorageBackend for CrashableBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        self.ensure_alive("append after crash")?;

        let written = self.switch.bytes_written.load(Ordering::SeqCst);
        let threshold = self.switch.crash_after_bytes.load(Ordering::SeqCst);

        if written.saturating_add(data.len()) > threshold {
            let partial = threshold.saturating_sub(written);
            if partial > 0 {
                self.inner.append(&data[..partial])?;
            }
            self.switch
                .bytes_written
                .fetch_add(partial, Ordering::SeqCst);
            self.switch.crashed.store(true, Ordering::SeqCst);
            return Err(Self::crashed_error("torn write"));
        }

        self.switch
            .bytes_written
            .fetch_add(data.len(), Ordering::SeqCst);
        self.inner.append(data)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.ensure_alive("flush after crash")?;
        self.inner.flush()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.ensure_alive("sync after crash")?;
        self.inner.sync()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        self.ensure_alive("truncate after crash")?;
        self.inner.truncate(new_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bioseq_core::{SequenceDataset, SequenceRecord, Store, StoreConfig};
    use bioseq_storage::{FileBackend, InMemoryBackend};
    use tempfile::tempdir;

    #[test]
    fn normal_operation_passes_through() {
        let mut backend = CrashableBackend::new(Box::new(InMemoryBackend::new()));
        let offset = backend.append(b"ACGT").unwrap();
        backend.flush().unwrap();
        assert_eq!(backend.read_at(offset, 4).unwrap(), b"ACGT");
        assert!(!backend.switch().has_crashed());
    }

    #[test]
    fn crash_writes_partial_data() {
        let mut backend = CrashableBackend::new(Box::new(InMemoryBackend::new()));
        let switch = backend.switch();
        backend.append(&[1; 5]).unwrap();
        switch.crash_after(3);

        assert!(backend.append(&[2; 10]).is_err());
        assert!(switch.has_crashed());
        assert_eq!(backend.size().unwrap(), 8);
        assert!(backend.truncate(5).is_err());
        assert!(backend.append(&[3]).is_err());
    }

    #[test]
    fn torn_commit_is_discarded_on_reopen() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("db");
        let config = StoreConfig::writable(&path).sync_on_commit(false);

        {
            let mut dataset = SequenceDataset::open(config.clone()).unwrap();
            dataset
                .add_sequence("kept", SequenceRecord::new("MKV", ["a"], 0), true)
                .unwrap();
            dataset.close().unwrap();
        }

        {
            let backend = CrashableBackend::new(Box::new(FileBackend::open(&path).unwrap()));
            let switch = backend.switch();
            let store = Store::with_backend(config.clone(), Box::new(backend)).unwrap();
            let mut dataset =
                SequenceDataset::from_store(store, bioseq_core::Sha256Hasher).unwrap();

            dataset
                .add_sequence("lost", SequenceRecord::new("GGC", ["b"], 0), true)
                .unwrap();
            switch.crash_after(20);
            assert!(dataset.commit().is_err());
            assert!(switch.has_crashed());
            // dropping reports the failed close through tracing
        }

        let dataset = SequenceDataset::open(config).unwrap();
        assert_eq!(dataset.keys().unwrap(), vec!["kept"]);
        assert!(!dataset.contains("GGC").unwrap());
    }

    #[test]
    fn failed_merge_commit_leaves_dataset_unchanged() {
        let backend = CrashableBackend::new(Box::new(InMemoryBackend::new()));
        let switch = backend.switch();
        let config = StoreConfig::default().read_only(false);
        let store = Store::with_backend(config, Box::new(backend)).unwrap();
        let mut dataset = SequenceDataset::from_store(store, bioseq_core::Sha256Hasher).unwrap();

        dataset
            .add_sequence("1", SequenceRecord::new("ab", ["a"], 0), true)
            .unwrap();
        dataset.commit().unwrap();

        switch.crash_after(0);
        assert!(dataset
            .add_sequence("2", SequenceRecord::new("ab", ["c"], 0), true)
            .is_err());

        assert_eq!(dataset.keys().unwrap(), vec!["1"]);
        assert!(dataset.get_sequence("2").unwrap().is_none());
        assert_eq!(dataset.index().candidates("ab"), ["1".to_owned()]);
        assert_eq!(dataset.stats().unwrap().pending_writes, 0);
    }

    #[test]
    fn crash_between_records_loses_only_the_open_batch() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("db");
        let config = StoreConfig::writable(&path).sync_on_commit(false);

        {
            let backend = CrashableBackend::new(Box::new(FileBackend::open(&path).unwrap()));
            let switch = backend.switch();
            let mut store = Store::with_backend(config.clone(), Box::new(backend)).unwrap();

            store.write("a", b"MKV,x,0").unwrap();
            store.commit().unwrap();

            store.write("b", b"GGC,y,1").unwrap();
            store.write("c", b"TTA,z,1").unwrap();
            // tears the second put; the commit record is never written
            switch.crash_after(45);
            assert!(store.commit().is_err());
        }

        let store = Store::open(StoreConfig::new(&path)).unwrap();
        assert_eq!(store.keys().unwrap(), vec!["a"]);
    }
}
