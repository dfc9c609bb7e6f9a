//! Production-parameter records.
//!
//! A production read reply is a fixed header followed by the parameter data:
//!
//! ```text
//! ┌────────────┬────────────────┬──────────────────┬──────────────────┐
//! │ Status (1B)│ Read type (2B) │ Data size (2B)   │ Data             │
//! │ 0 = ok     │ LE             │ LE               │ (Data size bytes)│
//! └────────────┴────────────────┴──────────────────┴──────────────────┘
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{ProtoError, RecordError, Result};

/// Size of the production read reply header.
pub const RECORD_HEADER_SIZE: usize = 5;

/// Parameter ID of the pre-shared key digest.
pub const PSK_DIGEST_READ_TYPE: u16 = 0xB003;

/// Parameter ID used when provisioning the white-box PSK.
pub const PSK_WHITE_BOX_WRITE_TYPE: u32 = 0xB002;

/// Parsed production read reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductionReadRecord {
    pub status: u8,
    pub read_type: u16,
    pub payload_size: u16,
    pub data: Bytes,
}

impl ProductionReadRecord {
    /// Parse and validate a reply for `expected_type`.
    ///
    /// Checks run in the order status, read type, size; the first violation
    /// is returned.
    pub fn parse(payload: &Bytes, expected_type: u16) -> std::result::Result<Self, RecordError> {
        if payload.len() < RECORD_HEADER_SIZE {
            return Err(RecordError::Truncated {
                len: payload.len(),
                min: RECORD_HEADER_SIZE,
            });
        }

        let status = payload[0];
        let read_type = u16::from_le_bytes([payload[1], payload[2]]);
        let payload_size = u16::from_le_bytes([payload[3], payload[4]]);

        if status != 0 {
            return Err(RecordError::Status(status));
        }
        if read_type != expected_type {
            return Err(RecordError::ReadType {
                expected: expected_type,
                actual: read_type,
            });
        }
        let actual = payload.len() - RECORD_HEADER_SIZE;
        if usize::from(payload_size) != actual {
            return Err(RecordError::SizeMismatch {
                declared: usize::from(payload_size),
                actual,
            });
        }

        Ok(Self {
            status,
            read_type,
            payload_size,
            data: payload.slice(RECORD_HEADER_SIZE..),
        })
    }

    /// Encode a successful reply; used by device models.
    pub fn reply(read_type: u16, data: &[u8]) -> Result<Bytes> {
        let size = u16::try_from(data.len()).map_err(|_| ProtoError::PayloadTooLarge {
            size: data.len(),
            max: u16::MAX as usize,
        })?;
        let mut buf = BytesMut::with_capacity(RECORD_HEADER_SIZE + data.len());
        buf.put_u8(0);
        buf.put_u16_le(read_type);
        buf.put_u16_le(size);
        buf.put_slice(data);
        Ok(buf.freeze())
    }
}

/// Request payload for a production read of `read_type`.
pub fn read_request(read_type: u16) -> [u8; 4] {
    let [lo, hi] = read_type.to_le_bytes();
    [lo, hi, 0x00, 0x00]
}

/// Production write request: type (4B LE), data length (4B LE), data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductionWrite {
    pub write_type: u32,
    pub data: Bytes,
}

impl ProductionWrite {
    const HEADER_SIZE: usize = 8;

    pub fn new(write_type: u32, data: impl Into<Bytes>) -> Self {
        Self {
            write_type,
            data: data.into(),
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(Self::HEADER_SIZE + self.data.len());
        buf.put_u32_le(self.write_type);
        buf.put_u32_le(self.data.len() as u32);
        buf.put_slice(&self.data);
        buf.freeze()
    }

    /// Parse a write request; `None` if the header or length is inconsistent.
    pub fn decode(payload: &Bytes) -> Option<Self> {
        if payload.len() < Self::HEADER_SIZE {
            return None;
        }
        let write_type = u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]);
        let len = u32::from_le_bytes([payload[4], payload[5], payload[6], payload[7]]) as usize;
        if payload.len() - Self::HEADER_SIZE != len {
            return None;
        }
        Some(Self {
            write_type,
            data: payload.slice(Self::HEADER_SIZE..),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(bytes: &[u8]) -> Bytes {
        Bytes::copy_from_slice(bytes)
    }

    #[test]
    fn psk_read_request_bytes() {
        assert_eq!(read_request(PSK_DIGEST_READ_TYPE), [0x03, 0xb0, 0x00, 0x00]);
    }

    #[test]
    fn parses_valid_record() {
        let reply = ProductionReadRecord::reply(PSK_DIGEST_READ_TYPE, &[0xaa; 32]).unwrap();
        let record = ProductionReadRecord::parse(&reply, PSK_DIGEST_READ_TYPE).unwrap();
        assert_eq!(record.status, 0);
        assert_eq!(record.payload_size, 32);
        assert_eq!(record.data.as_ref(), &[0xaa; 32]);
    }

    #[test]
    fn rejects_truncated_header() {
        let err = ProductionReadRecord::parse(&raw(&[0, 3, 0xb0]), PSK_DIGEST_READ_TYPE)
            .unwrap_err();
        assert_eq!(err, RecordError::Truncated { len: 3, min: 5 });
    }

    #[test]
    fn rejects_nonzero_status() {
        let err = ProductionReadRecord::parse(&raw(&[1, 0x03, 0xb0, 0, 0]), PSK_DIGEST_READ_TYPE)
            .unwrap_err();
        assert_eq!(err, RecordError::Status(1));
    }

    #[test]
    fn rejects_wrong_read_type() {
        let err = ProductionReadRecord::parse(&raw(&[0, 0x04, 0xb0, 0, 0]), PSK_DIGEST_READ_TYPE)
            .unwrap_err();
        assert_eq!(
            err,
            RecordError::ReadType {
                expected: 0xb003,
                actual: 0xb004
            }
        );
    }

    #[test]
    fn rejects_size_disagreement() {
        let err = ProductionReadRecord::parse(
            &raw(&[0, 0x03, 0xb0, 4, 0, 1, 2]),
            PSK_DIGEST_READ_TYPE,
        )
        .unwrap_err();
        assert_eq!(
            err,
            RecordError::SizeMismatch {
                declared: 4,
                actual: 2
            }
        );
    }

    #[test]
    fn write_request_layout() {
        let write = ProductionWrite::new(PSK_WHITE_BOX_WRITE_TYPE, vec![0x11, 0x22]);
        let wire = write.encode();
        assert_eq!(
            wire.as_ref(),
            &[0x02, 0xb0, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x11, 0x22]
        );
        assert_eq!(ProductionWrite::decode(&wire), Some(write));
    }

    #[test]
    fn write_decode_rejects_bad_length() {
        let wire = raw(&[0x02, 0xb0, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00, 0x11]);
        assert!(ProductionWrite::decode(&wire).is_none());
        assert!(ProductionWrite::decode(&raw(&[0x02, 0xb0])).is_none());
    }
}
