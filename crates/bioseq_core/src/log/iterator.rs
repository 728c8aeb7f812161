//! Streaming log record iterator.

use crate::error::{CoreError, CoreResult};
use crate::log::record::{
    compute_crc32, LogRecord, LogRecordType, CRC_SIZE, HEADER_SIZE, LOG_MAGIC, LOG_VERSION,
};
use bioseq_storage::StorageBackend;

/// Iterates over log records one at a time.
///
/// Each step reads one envelope header and one payload from the backend, so
/// memory stays proportional to the largest record rather than the log.
///
/// Yields `(offset, record)` pairs. A truncated record ends iteration
/// cleanly; corruption yields one error and then ends iteration.
pub struct LogRecordIterator<'a> {
    backend: &'a dyn StorageBackend,
    total_size: u64,
    offset: u64,
    finished: bool,
}

impl<'a> LogRecordIterator<'a> {
    /// Creates an iterator starting at `start_offset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend size cannot be determined.
    pub fn new(backend: &'a dyn StorageBackend, start_offset: u64) -> CoreResult<Self> {
        let total_size = backend.size()?;
        Ok(Self {
            backend,
            total_size,
            offset: start_offset,
            finished: false,
        })
    }

    /// Offset just past the last complete record read so far.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.offset
    }

    fn read_next_record(&mut self) -> CoreResult<Option<(u64, LogRecord)>> {
        let start = self.offset;
        let remaining = self.total_size.saturating_sub(start);

        if remaining < HEADER_SIZE as u64 {
            return Ok(None);
        }

        let header = self.backend.read_at(start, HEADER_SIZE)?;

        if header[0..4] != LOG_MAGIC {
            return Err(CoreError::log_corruption(format!(
                "invalid magic at offset {start}"
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version > LOG_VERSION {
            return Err(CoreError::log_corruption(format!(
                "unsupported version {version} at offset {start}"
            )));
        }

        let type_byte = header[6];
        let record_type = LogRecordType::from_byte(type_byte).ok_or_else(|| {
            CoreError::log_corruption(format!(
                "unknown record type {type_byte} at offset {start}"
            ))
        })?;

        let payload_len = u32::from_le_bytes([header[7], header[8], header[9], header[10]]) as usize;
        let total_len = HEADER_SIZE + payload_len + CRC_SIZE;

        if remaining < total_len as u64 {
            return Ok(None);
        }

        let body = self
            .backend
            .read_at(start + HEADER_SIZE as u64, payload_len + CRC_SIZE)?;
        let (payload, crc_bytes) = body.split_at(payload_len);
        let stored_crc = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);

        let mut covered = header;
        covered.extend_from_slice(payload);
        let computed_crc = compute_crc32(&covered);

        if stored_crc != computed_crc {
            return Err(CoreError::ChecksumMismatch {
                expected: stored_crc,
                actual: computed_crc,
            });
        }

        let record = LogRecord::decode_payload(record_type, payload)?;
        self.offset += total_len as u64;

        Ok(Some((start, record)))
    }
}

impl Iterator for LogRecordIterator<'_> {
    type Item = CoreResult<(u64, LogRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.read_next_record() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::LogManager;
    use crate::types::TransactionId;
    use bioseq_storage::InMemoryBackend;

    fn records() -> Vec<LogRecord> {
        let txid = TransactionId::new(1);
        vec![
            LogRecord::Put {
                txid,
                key: "a".into(),
                value: b"abc,x,0".to_vec(),
            },
            LogRecord::Delete {
                txid,
                key: "b".into(),
            },
            LogRecord::Commit { txid },
        ]
    }

    fn log_bytes(records: &[LogRecord]) -> Vec<u8> {
        let mut log = LogManager::new(Box::new(InMemoryBackend::new()), false);
        for record in records {
            log.append(record).unwrap();
        }
        let size = log.size().unwrap();
        log.backend().read_at(0, size as usize).unwrap()
    }

    #[test]
    fn empty_log() {
        let backend = InMemoryBackend::new();
        let mut iter = LogRecordIterator::new(&backend, 0).unwrap();
        assert!(iter.next().is_none());
        assert_eq!(iter.position(), 0);
    }

    #[test]
    fn reads_records_in_order() {
        let expected = records();
        let backend = InMemoryBackend::with_data(log_bytes(&expected));

        let read: Vec<_> = LogRecordIterator::new(&backend, 0)
            .unwrap()
            .map(|r| r.unwrap().1)
            .collect();
        assert_eq!(read, expected);
    }

    #[test]
    fn truncated_tail_is_clean_end() {
        let expected = records();
        let mut bytes = log_bytes(&expected);
        let full = bytes.len() as u64;
        bytes.truncate(bytes.len() - 3);

        let backend = InMemoryBackend::with_data(bytes);
        let mut iter = LogRecordIterator::new(&backend, 0).unwrap();
        let read: Vec<_> = iter.by_ref().map(|r| r.unwrap().1).collect();

        assert_eq!(read, expected[..2]);
        assert_eq!(iter.position(), full - expected[2].encoded_len() as u64);
    }

    #[test]
    fn truncated_header_is_clean_end() {
        let expected = records();
        let mut bytes = log_bytes(&expected[..1]);
        bytes.extend_from_slice(&LOG_MAGIC);

        let backend = InMemoryBackend::with_data(bytes);
        let read: Vec<_> = LogRecordIterator::new(&backend, 0)
            .unwrap()
            .collect::<CoreResult<_>>()
            .unwrap();
        assert_eq!(read.len(), 1);
    }

    #[test]
    fn flipped_byte_is_checksum_error() {
        let mut bytes = log_bytes(&records());
        bytes[HEADER_SIZE + 10] ^= 0x01;

        let backend = InMemoryBackend::with_data(bytes);
        let mut iter = LogRecordIterator::new(&backend, 0).unwrap();
        assert!(matches!(
            iter.next(),
            Some(Err(CoreError::ChecksumMismatch { .. }))
        ));
        assert!(iter.next().is_none());
    }

    #[test]
    fn bad_magic_is_corruption() {
        let mut bytes = log_bytes(&records());
        bytes[0] = b'X';

        let backend = InMemoryBackend::with_data(bytes);
        let mut iter = LogRecordIterator::new(&backend, 0).unwrap();
        assert!(matches!(
            iter.next(),
            Some(Err(CoreError::LogCorruption { .. }))
        ));
    }

    #[test]
    fn unknown_type_is_corruption() {
        let mut bytes = log_bytes(&records());
        bytes[6] = 42;

        let backend = InMemoryBackend::with_data(bytes);
        let err = LogRecordIterator::new(&backend, 0)
            .unwrap()
            .next()
            .unwrap()
            .unwrap_err();
        assert!(err.to_string().contains("unknown record type 42"));
    }
}
