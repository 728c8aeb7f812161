//! Transactional key-value store.
//!
//! A [`Store`] is a session over one transaction log. Opening replays the
//! log into an in-memory key directory; writes are buffered in the
//! session's single live transaction and become visible to other sessions
//! once [`Store::commit`] has appended and flushed them.
//!
//! ## Lifecycle
//!
//! ```text
//! Unopened ──init──► Open (read-only | read-write) ──close──► Closed
//! ```
//!
//! Operations on an unopened store fail with
//! [`CoreError::NotInitialized`]; on a closed store with
//! [`CoreError::StoreClosed`]. Dropping an open store commits and closes it.

mod compaction;
mod recovery;
mod transaction;

pub use compaction::CompactionResult;
pub use transaction::{PendingWrite, Transaction};

use crate::config::StoreConfig;
use crate::dir::{StoreLock, StorePaths};
use crate::error::{CoreError, CoreResult};
use crate::log::{LogManager, LogRecord, ValueLocation};
use bioseq_storage::{FileBackend, InMemoryBackend, StorageBackend};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Point-in-time summary of a store session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Keys visible to the session, pending writes included.
    pub entries: usize,
    /// Writes buffered since the last commit.
    pub pending_writes: usize,
    /// Current log size in bytes.
    pub log_bytes: u64,
    /// Configured maximum log size.
    pub map_size: u64,
    /// Whether the session is read-only.
    pub read_only: bool,
}

struct Session {
    log: LogManager,
    keydir: BTreeMap<String, ValueLocation>,
    txn: Transaction,
    read_only: bool,
    /// `None` for stores over a caller-supplied backend.
    paths: Option<StorePaths>,
    _lock: Option<StoreLock>,
}

impl Session {
    fn start(
        config: &StoreConfig,
        backend: Box<dyn StorageBackend>,
        paths: Option<StorePaths>,
        lock: Option<StoreLock>,
    ) -> CoreResult<Self> {
        let read_only = config.read_only || backend.is_read_only();
        let mut log = LogManager::new(backend, config.sync_on_commit);
        let recovered = recovery::replay(&log)?;

        let size = log.size()?;
        if size > recovered.committed_end {
            if read_only {
                debug!(
                    tail_bytes = size - recovered.committed_end,
                    "ignoring uncommitted log tail"
                );
            } else {
                warn!(
                    tail_bytes = size - recovered.committed_end,
                    records = recovered.discarded_records,
                    "discarding uncommitted log tail"
                );
                log.truncate(recovered.committed_end)?;
                log.sync()?;
            }
        }

        Ok(Self {
            log,
            keydir: recovered.keydir,
            txn: Transaction::new(recovered.next_txid),
            read_only,
            paths,
            _lock: lock,
        })
    }

    fn open_path(config: &StoreConfig) -> CoreResult<Self> {
        let paths = StorePaths::resolve(&config.path);
        let not_found = || CoreError::StoreNotFound {
            path: config.path.display().to_string(),
        };

        if config.read_only {
            if !paths.exists() {
                return Err(not_found());
            }
            let backend = FileBackend::open_read_only(paths.log_path())?;
            return Self::start(config, Box::new(backend), Some(paths), None);
        }

        if !paths.exists() && !config.create_if_missing {
            return Err(not_found());
        }
        let lock = StoreLock::acquire(&paths)?;
        let backend = FileBackend::open_with_create_dirs(paths.log_path())?;
        Self::start(config, Box::new(backend), Some(paths), Some(lock))
    }

    fn ensure_writable(&self) -> CoreResult<()> {
        if self.read_only {
            return Err(CoreError::ReadOnly);
        }
        Ok(())
    }

    /// The buffered write that removes `key`: a `Delete` if it was
    /// committed, otherwise nothing.
    fn removal(keydir: &BTreeMap<String, ValueLocation>, key: &str) -> Option<PendingWrite> {
        keydir.contains_key(key).then_some(PendingWrite::Delete)
    }

    fn contains_key(&self, key: &str) -> bool {
        match self.txn.get(key) {
            Some(PendingWrite::Put(_)) => true,
            Some(PendingWrite::Delete) => false,
            None => self.keydir.contains_key(key),
        }
    }
}

enum StoreState {
    Unopened,
    Open(Box<Session>),
    Closed,
}

/// A transactional key-value store backed by an append-only log.
///
/// # Example
///
/// ```rust,no_run
/// use bioseq_core::{Store, StoreConfig};
///
/// let mut store = Store::open(StoreConfig::writable("data/sequence.db"))?;
/// store.write("seq-1", b"ACGT,virus,1")?;
/// store.commit()?;
/// assert_eq!(store.read("seq-1")?, Some(b"ACGT,virus,1".to_vec()));
/// store.close()?;
/// # Ok::<(), bioseq_core::CoreError>(())
/// ```
pub struct Store {
    config: StoreConfig,
    state: StoreState,
}

impl Store {
    /// Creates an unopened store. Call [`Store::init`] before use.
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            state: StoreState::Unopened,
        }
    }

    /// Creates and opens a store.
    ///
    /// # Errors
    ///
    /// See [`Store::init`].
    pub fn open(config: StoreConfig) -> CoreResult<Self> {
        let mut store = Self::new(config);
        store.init()?;
        Ok(store)
    }

    /// Opens a store over a caller-supplied backend.
    ///
    /// No lock is taken. The session is read-only if the configuration or
    /// the backend says so.
    ///
    /// # Errors
    ///
    /// Returns an error if the log cannot be replayed.
    pub fn with_backend(config: StoreConfig, backend: Box<dyn StorageBackend>) -> CoreResult<Self> {
        let session = Session::start(&config, backend, None, None)?;
        info!(read_only = session.read_only, "opened store over custom backend");
        Ok(Self {
            config,
            state: StoreState::Open(Box::new(session)),
        })
    }

    /// Opens an empty read-write store held in memory.
    ///
    /// `config.path` and `config.read_only` are ignored.
    ///
    /// # Errors
    ///
    /// Infallible in practice; returns `CoreResult` for symmetry with
    /// [`Store::open`].
    pub fn open_in_memory(config: StoreConfig) -> CoreResult<Self> {
        Self::with_backend(config.read_only(false), Box::new(InMemoryBackend::new()))
    }

    /// Opens the session.
    ///
    /// Read-write sessions take an exclusive lock and create the store if
    /// allowed. Read-only sessions take no lock and require the store to
    /// exist. Calling `init` on an open store does nothing; calling it on a
    /// closed store starts a new session.
    ///
    /// # Errors
    ///
    /// - [`CoreError::StoreLocked`] if another session holds the write lock
    /// - [`CoreError::StoreNotFound`] if the store is missing and may not be
    ///   created
    /// - corruption or I/O errors from log replay
    pub fn init(&mut self) -> CoreResult<()> {
        if matches!(self.state, StoreState::Open(_)) {
            return Ok(());
        }

        let session = Session::open_path(&self.config)?;
        info!(
            path = %self.config.path.display(),
            read_only = session.read_only,
            entries = session.keydir.len(),
            "opened store"
        );
        self.state = StoreState::Open(Box::new(session));
        Ok(())
    }

    fn session(&self) -> CoreResult<&Session> {
        match &self.state {
            StoreState::Open(session) => Ok(&**session),
            StoreState::Unopened => Err(CoreError::NotInitialized),
            StoreState::Closed => Err(CoreError::StoreClosed),
        }
    }

    fn session_mut(&mut self) -> CoreResult<&mut Session> {
        match &mut self.state {
            StoreState::Open(session) => Ok(&mut **session),
            StoreState::Unopened => Err(CoreError::NotInitialized),
            StoreState::Closed => Err(CoreError::StoreClosed),
        }
    }

    /// Reads the value stored under `key`.
    ///
    /// Writes buffered in this session are visible. A missing key is
    /// `Ok(None)`.
    pub fn read(&self, key: &str) -> CoreResult<Option<Vec<u8>>> {
        let session = self.session()?;

        match session.txn.get(key) {
            Some(PendingWrite::Put(value)) => Ok(Some(value.clone())),
            Some(PendingWrite::Delete) => Ok(None),
            None => match session.keydir.get(key) {
                Some(location) => Ok(Some(session.log.read_value(*location)?)),
                None => Ok(None),
            },
        }
    }

    /// Returns whether `key` is visible to this session.
    pub fn contains_key(&self, key: &str) -> CoreResult<bool> {
        Ok(self.session()?.contains_key(key))
    }

    /// Buffers `value` under `key` until the next commit.
    ///
    /// # Errors
    ///
    /// - [`CoreError::ReadOnly`] on read-only sessions
    /// - [`CoreError::MapFull`] if committing the batch would grow the log
    ///   past `map_size`; the write is not buffered
    pub fn write(&mut self, key: &str, value: &[u8]) -> CoreResult<()> {
        let map_size = self.config.map_size;
        let session = self.session_mut()?;
        session.ensure_writable()?;

        let write = PendingWrite::Put(value.to_vec());
        let required = session.log.size()? + session.txn.commit_len_with(key, &write);
        if required > map_size {
            return Err(CoreError::MapFull { required, map_size });
        }

        session.txn.record(key, write);
        Ok(())
    }

    /// Deletes `key` and commits immediately if it existed.
    ///
    /// Returns whether a deletion happened. The commit also publishes any
    /// other writes buffered in this session.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ReadOnly`] on read-only sessions, or any commit
    /// error. If the commit fails the key is left as it was.
    pub fn remove(&mut self, key: &str) -> CoreResult<bool> {
        let session = self.session_mut()?;
        session.ensure_writable()?;

        if !session.contains_key(key) {
            return Ok(false);
        }

        let previous = session.txn.get(key).cloned();
        match Session::removal(&session.keydir, key) {
            Some(write) => session.txn.record(key, write),
            None => {
                session.txn.discard(key);
            }
        }

        if let Err(e) = self.commit() {
            self.restore_pending(key, previous)?;
            return Err(e);
        }
        Ok(true)
    }

    /// Returns the write buffered for `key` in this session, if any.
    pub fn pending_write(&self, key: &str) -> CoreResult<Option<PendingWrite>> {
        Ok(self.session()?.txn.get(key).cloned())
    }

    /// Puts back the buffered write for `key` as returned by
    /// [`Store::pending_write`]. `None` leaves only the committed value.
    pub(crate) fn restore_pending(
        &mut self,
        key: &str,
        write: Option<PendingWrite>,
    ) -> CoreResult<()> {
        let session = self.session_mut()?;
        match write {
            Some(write) => session.txn.record(key, write),
            None => {
                session.txn.discard(key);
            }
        }
        Ok(())
    }

    /// Checks that writing `puts`, then removing `removals`, would still
    /// commit within `map_size`. Nothing is buffered.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ReadOnly`] on read-only sessions or
    /// [`CoreError::MapFull`] if the commit would not fit.
    pub fn check_capacity(&self, puts: &[(&str, &[u8])], removals: &[&str]) -> CoreResult<()> {
        let session = self.session()?;
        session.ensure_writable()?;

        let mut changes: Vec<(&str, Option<PendingWrite>)> = puts
            .iter()
            .map(|(key, value)| (*key, Some(PendingWrite::Put(value.to_vec()))))
            .collect();
        changes.extend(
            removals
                .iter()
                .map(|key| (*key, Session::removal(&session.keydir, key))),
        );

        let required = session.log.size()? + session.txn.commit_len_after(&changes);
        if required > self.config.map_size {
            return Err(CoreError::MapFull {
                required,
                map_size: self.config.map_size,
            });
        }
        Ok(())
    }

    /// Publishes buffered writes and starts a new transaction.
    ///
    /// Appends the batch and a `Commit` record, then flushes (and syncs
    /// when `sync_on_commit` is set). Does nothing on read-only sessions or
    /// when nothing is buffered. On failure the log is cut back and the
    /// batch stays buffered.
    pub fn commit(&mut self) -> CoreResult<()> {
        let map_size = self.config.map_size;
        let session = self.session_mut()?;
        if session.read_only || session.txn.is_empty() {
            return Ok(());
        }

        let start = session.log.size()?;
        let required = start + session.txn.commit_len();
        if required > map_size {
            return Err(CoreError::MapFull { required, map_size });
        }

        let applied = match append_batch(&mut session.log, &session.txn) {
            Ok(applied) => applied,
            Err(e) => {
                if let Err(rollback) = session.log.truncate(start) {
                    warn!(error = %rollback, "failed to cut back partial commit");
                }
                return Err(e);
            }
        };

        let txid = session.txn.id();
        let writes = applied.len();
        for (key, location) in applied {
            match location {
                Some(location) => {
                    session.keydir.insert(key, location);
                }
                None => {
                    session.keydir.remove(&key);
                }
            }
        }
        session.txn = Transaction::new(txid.next());

        debug!(%txid, writes, "committed transaction");
        Ok(())
    }

    /// Commits pending work and ends the session, releasing the lock.
    ///
    /// Closing an unopened or closed store does nothing. If the final
    /// commit fails the session stays open.
    pub fn close(&mut self) -> CoreResult<()> {
        if !matches!(self.state, StoreState::Open(_)) {
            return Ok(());
        }

        self.commit()?;
        if let StoreState::Open(session) = &mut self.state {
            if !session.read_only {
                session.log.sync()?;
            }
        }

        self.state = StoreState::Closed;
        info!(path = %self.config.path.display(), "closed store");
        Ok(())
    }

    /// Returns the number of keys visible to this session.
    pub fn count(&self) -> CoreResult<usize> {
        let session = self.session()?;
        let mut count = session.keydir.len();
        for (key, write) in session.txn.pending_writes() {
            match (write, session.keydir.contains_key(key)) {
                (PendingWrite::Put(_), false) => count += 1,
                (PendingWrite::Delete, true) => count -= 1,
                _ => {}
            }
        }
        Ok(count)
    }

    /// Returns the keys visible to this session, in order.
    pub fn keys(&self) -> CoreResult<Vec<String>> {
        let session = self.session()?;
        let mut keys: BTreeSet<&String> = session.keydir.keys().collect();
        for (key, write) in session.txn.pending_writes() {
            match write {
                PendingWrite::Put(_) => {
                    keys.insert(key);
                }
                PendingWrite::Delete => {
                    keys.remove(key);
                }
            }
        }
        Ok(keys.into_iter().cloned().collect())
    }

    /// Commits, then rewrites the log to hold only live entries.
    ///
    /// File stores write a scratch file next to the log and rename it over
    /// the log. Stores over a custom backend are rewritten in place.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::ReadOnly`] on read-only sessions.
    pub fn compact(&mut self) -> CoreResult<CompactionResult> {
        self.commit()?;

        let sync_on_commit = self.config.sync_on_commit;
        let session = self.session_mut()?;
        session.ensure_writable()?;

        let bytes_before = session.log.size()?;
        let txid = session.txn.id();

        match &session.paths {
            Some(paths) => {
                let scratch = paths.compact_path();
                let mut target =
                    LogManager::new(Box::new(FileBackend::open(&scratch)?), sync_on_commit);
                target.truncate(0)?;
                let keydir = compaction::copy_live(&session.log, &session.keydir, &mut target, txid)?;
                drop(target);

                std::fs::rename(&scratch, paths.log_path())?;
                session.log = LogManager::new(
                    Box::new(FileBackend::open(paths.log_path())?),
                    sync_on_commit,
                );
                session.keydir = keydir;
            }
            None => {
                let mut target = LogManager::new(Box::new(InMemoryBackend::new()), false);
                let keydir = compaction::copy_live(&session.log, &session.keydir, &mut target, txid)?;
                session.log.rewrite_from(&target)?;
                session.keydir = keydir;
            }
        }
        session.txn = Transaction::new(txid.next());

        let result = CompactionResult {
            entries: session.keydir.len(),
            bytes_before,
            bytes_after: session.log.size()?,
        };
        info!(
            entries = result.entries,
            bytes_before = result.bytes_before,
            bytes_after = result.bytes_after,
            "compacted store"
        );
        Ok(result)
    }

    /// Returns a summary of the session.
    pub fn stats(&self) -> CoreResult<StoreStats> {
        let session = self.session()?;
        Ok(StoreStats {
            entries: self.count()?,
            pending_writes: session.txn.write_count(),
            log_bytes: session.log.size()?,
            map_size: self.config.map_size,
            read_only: session.read_only,
        })
    }

    /// Returns whether a session is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self.state, StoreState::Open(_))
    }

    /// Returns whether the open session is read-only.
    pub fn is_read_only(&self) -> CoreResult<bool> {
        Ok(self.session()?.read_only)
    }

    /// Returns the store configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

/// Appends every buffered write and the `Commit` record, then persists.
///
/// Returns the key directory changes to apply.
fn append_batch(
    log: &mut LogManager,
    txn: &Transaction,
) -> CoreResult<Vec<(String, Option<ValueLocation>)>> {
    let txid = txn.id();
    let mut applied = Vec::with_capacity(txn.write_count());

    for (key, write) in txn.pending_writes() {
        let record = match write {
            PendingWrite::Put(value) => LogRecord::Put {
                txid,
                key: key.clone(),
                value: value.clone(),
            },
            PendingWrite::Delete => LogRecord::Delete {
                txid,
                key: key.clone(),
            },
        };
        let offset = log.append(&record)?;
        let location = record.value_span().map(|(relative, len)| ValueLocation {
            offset: offset + relative,
            len,
        });
        applied.push((key.clone(), location));
    }

    log.append(&LogRecord::Commit { txid })?;
    log.persist()?;
    Ok(applied)
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.config.path)
            .field("is_open", &self.is_open())
            .finish_non_exhaustive()
    }
}

impl Drop for Store {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "failed to close store cleanly");
        }
    }
}
