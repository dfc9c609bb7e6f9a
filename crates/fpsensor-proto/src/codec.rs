use std::fmt::Write as _;

use bytes::{BufMut, Bytes, BytesMut};

use crate::command::Command;
use crate::error::{ProtoError, Result};

/// Message header: category (1) + command (1) = 2 bytes.
pub const HEADER_SIZE: usize = 2;

/// Largest message one transport unit can carry.
pub const MAX_FRAME_SIZE: usize = u16::MAX as usize;

/// Largest payload that fits next to the header.
pub const MAX_PAYLOAD: usize = MAX_FRAME_SIZE - HEADER_SIZE;

/// One request or reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub category: u8,
    pub command: u8,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(cmd: Command, payload: impl Into<Bytes>) -> Self {
        Self {
            category: cmd.category,
            command: cmd.command,
            payload: payload.into(),
        }
    }

    /// The command this frame carries.
    pub fn cmd(&self) -> Command {
        Command::new(self.category, self.command)
    }

    /// True when this frame answers `cmd`.
    pub fn is(&self, cmd: Command) -> bool {
        self.category == cmd.category && self.command == cmd.command
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// Encode a message into `dst`.
///
/// ```text
/// ┌──────────────┬─────────────┬──────────────────────────┐
/// │ Category (1B)│ Command (1B)│ Payload (length from the │
/// │              │             │ transport, not embedded) │
/// └──────────────┴─────────────┴──────────────────────────┘
/// ```
pub fn encode_frame(category: u8, command: u8, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    if payload.len() > MAX_PAYLOAD {
        return Err(ProtoError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD,
        });
    }
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u8(category);
    dst.put_u8(command);
    dst.put_slice(payload);
    Ok(())
}

/// Encode a message into a fresh buffer.
pub fn encode(cmd: Command, payload: &[u8]) -> Result<Bytes> {
    let mut buf = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    encode_frame(cmd.category, cmd.command, payload, &mut buf)?;
    Ok(buf.freeze())
}

/// Decode one message whose length is exactly `raw.len()`.
pub fn decode_frame(raw: Bytes) -> Result<Frame> {
    let declared = raw.len();
    decode_with_length(raw, declared)
}

/// Decode one message, checking it against the length the transport declared.
///
/// Nothing past `declared_len` is read; a buffer that is shorter or longer
/// than declared is rejected.
pub fn decode_with_length(raw: Bytes, declared_len: usize) -> Result<Frame> {
    if declared_len > MAX_FRAME_SIZE {
        return Err(ProtoError::PayloadTooLarge {
            size: declared_len,
            max: MAX_FRAME_SIZE,
        });
    }
    if declared_len < HEADER_SIZE {
        return Err(ProtoError::MalformedFrame {
            reason: format!("{declared_len} bytes is shorter than the {HEADER_SIZE}-byte header"),
        });
    }
    if raw.len() != declared_len {
        return Err(ProtoError::MalformedFrame {
            reason: format!(
                "declared length {declared_len} does not match {} bytes received",
                raw.len()
            ),
        });
    }

    Ok(Frame {
        category: raw[0],
        command: raw[1],
        payload: raw.slice(HEADER_SIZE..declared_len),
    })
}

/// Lowercase hex dump for diagnostics.
pub fn render_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{FIRMWARE_VERSION, PING, PRODUCTION_READ};

    #[test]
    fn encode_decode_roundtrip() {
        let wire = encode(PRODUCTION_READ, &[0x03, 0xb0, 0x00, 0x00]).unwrap();
        assert_eq!(wire.as_ref(), &[0x0e, 0x02, 0x03, 0xb0, 0x00, 0x00]);

        let frame = decode_frame(wire).unwrap();
        assert!(frame.is(PRODUCTION_READ));
        assert_eq!(frame.payload.as_ref(), &[0x03, 0xb0, 0x00, 0x00]);
        assert_eq!(frame.wire_size(), 6);
    }

    #[test]
    fn roundtrip_at_size_limits() {
        for len in [0usize, 1, 255, 256, MAX_PAYLOAD] {
            let payload = vec![0x5a; len];
            let wire = encode(FIRMWARE_VERSION, &payload).unwrap();
            let frame = decode_frame(wire).unwrap();
            assert_eq!(frame.payload.len(), len);
            assert!(frame.is(FIRMWARE_VERSION));
        }
    }

    #[test]
    fn encode_rejects_oversized_payload() {
        let payload = vec![0u8; MAX_PAYLOAD + 1];
        let err = encode(PING, &payload).unwrap_err();
        assert!(matches!(err, ProtoError::PayloadTooLarge { .. }));
    }

    #[test]
    fn decode_rejects_short_buffers() {
        for raw in [&[][..], &[0x0a][..]] {
            let err = decode_frame(Bytes::copy_from_slice(raw)).unwrap_err();
            assert!(matches!(err, ProtoError::MalformedFrame { .. }));
        }
    }

    #[test]
    fn decode_rejects_oversized_buffer() {
        let raw = Bytes::from(vec![0u8; MAX_FRAME_SIZE + 1]);
        let err = decode_frame(raw).unwrap_err();
        assert!(matches!(err, ProtoError::PayloadTooLarge { .. }));
    }

    #[test]
    fn decode_rejects_length_disagreement() {
        let raw = Bytes::from_static(&[0x0a, 0x04, 0x41, 0x42]);

        let truncated = decode_with_length(raw.clone(), 6).unwrap_err();
        assert!(matches!(truncated, ProtoError::MalformedFrame { .. }));

        let trailing = decode_with_length(raw, 3).unwrap_err();
        assert!(matches!(trailing, ProtoError::MalformedFrame { .. }));
    }

    #[test]
    fn decode_never_panics_on_arbitrary_prefixes() {
        let wire = encode(PRODUCTION_READ, &[1, 2, 3, 4, 5, 6, 7]).unwrap();
        for cut in 0..=wire.len() {
            let prefix = wire.slice(..cut);
            for declared in 0..=wire.len() + 2 {
                let _ = decode_with_length(prefix.clone(), declared);
            }
        }
    }

    #[test]
    fn hex_rendering() {
        assert_eq!(render_hex(&[0x00, 0x0a, 0xff]), "000aff");
        assert_eq!(render_hex(&[]), "");
    }
}
