//! Log writer and value reader.

use crate::error::{CoreError, CoreResult};
use crate::log::iterator::LogRecordIterator;
use crate::log::record::{compute_crc32, LogRecord, CRC_SIZE, HEADER_SIZE, LOG_MAGIC, LOG_VERSION};
use bioseq_storage::StorageBackend;

/// Where a committed value lives inside the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueLocation {
    /// Absolute offset of the first value byte.
    pub offset: u64,
    /// Value length in bytes.
    pub len: usize,
}

/// Owns the log backend: appends records and reads values back.
pub struct LogManager {
    backend: Box<dyn StorageBackend>,
    sync_on_commit: bool,
}

impl LogManager {
    /// Creates a log manager over `backend`.
    pub fn new(backend: Box<dyn StorageBackend>, sync_on_commit: bool) -> Self {
        Self {
            backend,
            sync_on_commit,
        }
    }

    /// Appends a record to the log.
    ///
    /// Returns the offset where the record was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be encoded or the backend
    /// rejects the write.
    pub fn append(&mut self, record: &LogRecord) -> CoreResult<u64> {
        let payload = record.encode_payload()?;

        let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        data.extend_from_slice(&LOG_MAGIC);
        data.extend_from_slice(&LOG_VERSION.to_le_bytes());
        data.push(record.record_type().as_byte());
        let len = u32::try_from(payload.len())
            .map_err(|_| CoreError::RecordTooLarge { size: payload.len() })?;
        data.extend_from_slice(&len.to_le_bytes());
        data.extend_from_slice(&payload);

        let crc = compute_crc32(&data);
        data.extend_from_slice(&crc.to_le_bytes());

        Ok(self.backend.append(&data)?)
    }

    /// Makes everything appended so far durable.
    ///
    /// Always flushes; additionally syncs when the log was created with
    /// `sync_on_commit`.
    pub fn persist(&mut self) -> CoreResult<()> {
        self.backend.flush()?;
        if self.sync_on_commit {
            self.backend.sync()?;
        }
        Ok(())
    }

    /// Syncs data and metadata regardless of `sync_on_commit`.
    pub fn sync(&mut self) -> CoreResult<()> {
        self.backend.flush()?;
        self.backend.sync()?;
        Ok(())
    }

    /// Returns the current log size.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.size()?)
    }

    /// Cuts the log back to `len` bytes.
    pub fn truncate(&mut self, len: u64) -> CoreResult<()> {
        self.backend.truncate(len)?;
        Ok(())
    }

    /// Replaces the whole log with the contents of `other` and syncs.
    ///
    /// Offsets in `other` stay valid for the rewritten log.
    pub fn rewrite_from(&mut self, other: &Self) -> CoreResult<()> {
        let size = other.size()?;
        let len = usize::try_from(size).map_err(|_| CoreError::RecordTooLarge {
            size: usize::MAX,
        })?;
        let data = other.backend.read_at(0, len)?;

        self.backend.truncate(0)?;
        self.backend.append(&data)?;
        self.sync()
    }

    /// Reads a committed value.
    pub fn read_value(&self, location: ValueLocation) -> CoreResult<Vec<u8>> {
        Ok(self.backend.read_at(location.offset, location.len)?)
    }

    /// Returns a streaming iterator over all records.
    pub fn iter(&self) -> CoreResult<LogRecordIterator<'_>> {
        LogRecordIterator::new(self.backend.as_ref(), 0)
    }

    /// Returns whether the underlying backend rejects writes.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.backend.is_read_only()
    }

    /// Returns the underlying backend.
    #[must_use]
    pub fn backend(&self) -> &dyn StorageBackend {
        self.backend.as_ref()
    }
}

impl std::fmt::Debug for LogManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogManager")
            .field("sync_on_commit", &self.sync_on_commit)
            .field("read_only", &self.is_read_only())
            .finish_non_exhaustive()
    }
}
