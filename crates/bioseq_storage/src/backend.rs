//! Storage backend trait definition.

use crate::error::StorageResult;

/// A low-level, append-only byte store.
///
/// The sequence store writes its transaction log through this trait and
/// never asks a backend to interpret the bytes it holds.
///
/// # Invariants
///
/// - `append` returns the offset where data was written
/// - `read_at` returns exactly the bytes previously written at that offset
/// - `flush` hands appended data to the OS, `sync` makes it durable
/// - Read-only backends reject `append` and `truncate` with
///   [`StorageError::ReadOnly`](crate::StorageError::ReadOnly)
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::FileBackend`] - For persistent storage
pub trait StorageBackend: Send + Sync {
    /// Reads `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the read would extend beyond the current size
    /// or an I/O error occurs.
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Appends data to the end of the storage.
    ///
    /// Returns the offset where the data was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is read-only or an I/O error occurs.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Flushes all pending writes to the operating system.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush operation fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Returns the current size of the storage in bytes.
    ///
    /// This is the offset where the next `append` will write.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Syncs all data and metadata to durable storage.
    ///
    /// After this returns successfully, all previously appended data
    /// survives process termination.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync operation fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Truncates the storage to `new_size` bytes.
    ///
    /// Used to cut off a torn, uncommitted log tail before new
    /// transactions are appended after it.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is read-only, `new_size` is greater
    /// than the current size, or the truncation fails.
    fn truncate(&mut self, new_size: u64) -> StorageResult<()>;

    /// Returns whether this backend rejects mutations.
    fn is_read_only(&self) -> bool {
        false
    }
}
