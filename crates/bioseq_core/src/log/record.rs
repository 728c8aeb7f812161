//! Log record types and serialization.

use crate::error::{CoreError, CoreResult};
use crate::types::TransactionId;

/// Magic bytes identifying a log record.
pub const LOG_MAGIC: [u8; 4] = *b"BSQL";

/// Current log format version.
pub const LOG_VERSION: u16 = 1;

/// Envelope header size: magic (4) + version (2) + type (1) + length (4).
pub const HEADER_SIZE: usize = 11;

/// Trailing checksum size.
pub const CRC_SIZE: usize = 4;

/// Type of log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LogRecordType {
    /// Insert or overwrite a key.
    Put = 1,
    /// Delete a key.
    Delete = 2,
    /// Commit a transaction.
    Commit = 3,
}

impl LogRecordType {
    /// Converts a byte to a record type.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Put),
            2 => Some(Self::Delete),
            3 => Some(Self::Commit),
            _ => None,
        }
    }

    /// Converts the record type to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A record in the transaction log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogRecord {
    /// Insert or overwrite a key.
    Put {
        /// Owning transaction.
        txid: TransactionId,
        /// Store key.
        key: String,
        /// Stored value.
        value: Vec<u8>,
    },

    /// Delete a key.
    Delete {
        /// Owning transaction.
        txid: TransactionId,
        /// Store key.
        key: String,
    },

    /// Commit a transaction.
    Commit {
        /// Committed transaction.
        txid: TransactionId,
    },
}

impl LogRecord {
    /// Maximum size of a key or value; lengths are stored in 4 bytes.
    pub const MAX_FIELD_SIZE: usize = u32::MAX as usize;

    /// Returns the record type.
    #[must_use]
    pub fn record_type(&self) -> LogRecordType {
        match self {
            Self::Put { .. } => LogRecordType::Put,
            Self::Delete { .. } => LogRecordType::Delete,
            Self::Commit { .. } => LogRecordType::Commit,
        }
    }

    /// Returns the owning transaction.
    #[must_use]
    pub fn txid(&self) -> TransactionId {
        match self {
            Self::Put { txid, .. } | Self::Delete { txid, .. } | Self::Commit { txid } => *txid,
        }
    }

    /// Returns the size of the payload without the envelope.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        match self {
            Self::Put { key, value, .. } => 8 + 4 + key.len() + 4 + value.len(),
            Self::Delete { key, .. } => 8 + 4 + key.len(),
            Self::Commit { .. } => 8,
        }
    }

    /// Returns the size of the record on disk, envelope included.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.payload_len() + CRC_SIZE
    }

    /// Position of a `Put` value relative to the start of its record.
    ///
    /// Returns `None` for records that carry no value.
    #[must_use]
    pub fn value_span(&self) -> Option<(u64, usize)> {
        match self {
            Self::Put { key, value, .. } => {
                Some(((HEADER_SIZE + 8 + 4 + key.len() + 4) as u64, value.len()))
            }
            _ => None,
        }
    }

    /// Serializes the record payload (without envelope).
    ///
    /// # Errors
    ///
    /// Returns an error if a key or value exceeds [`Self::MAX_FIELD_SIZE`].
    pub fn encode_payload(&self) -> CoreResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.payload_len());
        buf.extend_from_slice(&self.txid().as_u64().to_le_bytes());

        match self {
            Self::Put { key, value, .. } => {
                put_field(&mut buf, key.as_bytes())?;
                put_field(&mut buf, value)?;
            }
            Self::Delete { key, .. } => {
                put_field(&mut buf, key.as_bytes())?;
            }
            Self::Commit { .. } => {}
        }

        Ok(buf)
    }

    /// Deserializes a record from its type and payload.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::LogCorruption`] if the payload is short, has
    /// trailing bytes, or holds a non-UTF-8 key.
    pub fn decode_payload(record_type: LogRecordType, payload: &[u8]) -> CoreResult<Self> {
        let mut cursor = PayloadCursor { payload, pos: 0 };
        let txid = TransactionId::new(cursor.u64()?);

        let record = match record_type {
            LogRecordType::Put => {
                let key = cursor.key()?;
                let value = cursor.field()?.to_vec();
                Self::Put { txid, key, value }
            }
            LogRecordType::Delete => Self::Delete {
                txid,
                key: cursor.key()?,
            },
            LogRecordType::Commit => Self::Commit { txid },
        };

        if cursor.pos != payload.len() {
            return Err(CoreError::log_corruption(format!(
                "trailing bytes in {record_type:?} record: expected {} bytes, got {}",
                cursor.pos,
                payload.len()
            )));
        }

        Ok(record)
    }
}

fn put_field(buf: &mut Vec<u8>, field: &[u8]) -> CoreResult<()> {
    let len = u32::try_from(field.len())
        .map_err(|_| CoreError::RecordTooLarge { size: field.len() })?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(field);
    Ok(())
}

struct PayloadCursor<'a> {
    payload: &'a [u8],
    pos: usize,
}

impl<'a> PayloadCursor<'a> {
    fn take(&mut self, len: usize) -> CoreResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.payload.len())
            .ok_or_else(|| CoreError::log_corruption("unexpected end of payload"))?;
        let bytes = &self.payload[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn u64(&mut self) -> CoreResult<u64> {
        let bytes: [u8; 8] = self
            .take(8)?
            .try_into()
            .map_err(|_| CoreError::log_corruption("invalid u64"))?;
        Ok(u64::from_le_bytes(bytes))
    }

    fn field(&mut self) -> CoreResult<&'a [u8]> {
        let bytes: [u8; 4] = self
            .take(4)?
            .try_into()
            .map_err(|_| CoreError::log_corruption("invalid length"))?;
        self.take(u32::from_le_bytes(bytes) as usize)
    }

    fn key(&mut self) -> CoreResult<String> {
        let bytes = self.field()?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| CoreError::log_corruption("key is not valid UTF-8"))
    }
}

/// Computes the CRC32 (IEEE) checksum of `data`.
pub fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    !crc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(key: &str, value: &[u8]) -> LogRecord {
        LogRecord::Put {
            txid: TransactionId::new(3),
            key: key.into(),
            value: value.to_vec(),
        }
    }

    #[test]
    fn record_type_bytes() {
        for t in [LogRecordType::Put, LogRecordType::Delete, LogRecordType::Commit] {
            assert_eq!(LogRecordType::from_byte(t.as_byte()), Some(t));
        }
        assert_eq!(LogRecordType::from_byte(0), None);
        assert_eq!(LogRecordType::from_byte(9), None);
    }

    #[test]
    fn put_payload_layout() {
        let record = put("k1", b"ab,x,0");
        let payload = record.encode_payload().unwrap();

        assert_eq!(payload.len(), record.payload_len());
        assert_eq!(&payload[..8], &3u64.to_le_bytes());
        assert_eq!(&payload[8..12], &2u32.to_le_bytes());
        assert_eq!(&payload[12..14], b"k1");

        let (start, len) = record.value_span().unwrap();
        let start = start as usize - HEADER_SIZE;
        assert_eq!(&payload[start..start + len], b"ab,x,0");
    }

    #[test]
    fn delete_and_commit_decode() {
        let delete = LogRecord::Delete {
            txid: TransactionId::new(9),
            key: "gone".into(),
        };
        let payload = delete.encode_payload().unwrap();
        assert_eq!(
            LogRecord::decode_payload(LogRecordType::Delete, &payload).unwrap(),
            delete
        );
        assert_eq!(delete.value_span(), None);

        let commit = LogRecord::Commit {
            txid: TransactionId::new(9),
        };
        assert_eq!(commit.encoded_len(), HEADER_SIZE + 8 + CRC_SIZE);
    }

    #[test]
    fn decode_rejects_trailing_bytes() {
        let mut payload = put("k", b"v").encode_payload().unwrap();
        payload.push(0);
        let err = LogRecord::decode_payload(LogRecordType::Put, &payload).unwrap_err();
        assert!(matches!(err, CoreError::LogCorruption { .. }));
    }

    #[test]
    fn decode_rejects_short_payload() {
        let payload = put("key", b"value").encode_payload().unwrap();
        let err =
            LogRecord::decode_payload(LogRecordType::Put, &payload[..payload.len() - 1]).unwrap_err();
        assert!(matches!(err, CoreError::LogCorruption { .. }));
    }

    #[test]
    fn decode_rejects_invalid_key() {
        let mut payload = 1u64.to_le_bytes().to_vec();
        payload.extend_from_slice(&1u32.to_le_bytes());
        payload.push(0xff);
        let err = LogRecord::decode_payload(LogRecordType::Delete, &payload).unwrap_err();
        assert!(matches!(err, CoreError::LogCorruption { .. }));
    }

    #[test]
    fn crc32_known_value() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(compute_crc32(b""), 0);
    }
}
