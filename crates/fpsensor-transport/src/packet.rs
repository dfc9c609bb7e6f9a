use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{Result, TransportError};

/// Link packet header: kind (1) + body length (2) = 3 bytes.
pub const PACKET_HEADER_SIZE: usize = 3;

/// Largest body the 16-bit length field can carry.
pub const MAX_PACKET_BODY: usize = u16::MAX as usize;

/// What a link packet carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketKind {
    /// An encoded protocol message.
    Data = 0xA0,
    /// Host request to reset the device.
    Reset = 0xA2,
    /// Device acknowledgement of a `Data` or `Reset` packet.
    Ack = 0xB0,
}

impl PacketKind {
    fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0xA0 => Ok(Self::Data),
            0xA2 => Ok(Self::Reset),
            0xB0 => Ok(Self::Ack),
            kind => Err(TransportError::UnexpectedPacket { kind }),
        }
    }
}

/// One unit on the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub kind: PacketKind,
    pub body: Bytes,
}

impl Packet {
    pub fn new(kind: PacketKind, body: impl Into<Bytes>) -> Self {
        Self {
            kind,
            body: body.into(),
        }
    }

    pub fn ack() -> Self {
        Self::new(PacketKind::Ack, Bytes::new())
    }
}

/// Encode a packet into the link format.
///
/// ```text
/// ┌───────────┬──────────────┬──────────────────┐
/// │ Kind (1B) │ Length (2B)  │ Body             │
/// │           │ LE           │ (Length bytes)   │
/// └───────────┴──────────────┴──────────────────┘
/// ```
pub fn encode_packet(kind: PacketKind, body: &[u8], dst: &mut BytesMut) -> Result<()> {
    if body.len() > MAX_PACKET_BODY {
        return Err(TransportError::PacketTooLarge {
            size: body.len(),
            max: MAX_PACKET_BODY,
        });
    }
    dst.reserve(PACKET_HEADER_SIZE + body.len());
    dst.put_u8(kind as u8);
    dst.put_u16_le(body.len() as u16);
    dst.put_slice(body);
    Ok(())
}

/// Decode one packet from the front of `src`.
///
/// Returns `Ok(None)` until a complete packet is buffered; consumes the
/// packet bytes on success.
pub fn decode_packet(src: &mut BytesMut) -> Result<Option<Packet>> {
    if src.len() < PACKET_HEADER_SIZE {
        return Ok(None);
    }

    let kind = PacketKind::from_byte(src[0])?;
    let body_len = u16::from_le_bytes([src[1], src[2]]) as usize;
    if src.len() < PACKET_HEADER_SIZE + body_len {
        return Ok(None);
    }

    src.advance(PACKET_HEADER_SIZE);
    let body = src.split_to(body_len).freeze();
    Ok(Some(Packet { kind, body }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_packet_layout() {
        let mut buf = BytesMut::new();
        encode_packet(PacketKind::Data, &[0x0a, 0x04, 0x00], &mut buf).unwrap();
        assert_eq!(buf.as_ref(), &[0xA0, 0x03, 0x00, 0x0a, 0x04, 0x00]);
    }

    #[test]
    fn decode_waits_for_complete_body() {
        let mut buf = BytesMut::from(&[0xA0, 0x04, 0x00, 0x01, 0x02][..]);
        assert!(decode_packet(&mut buf).unwrap().is_none());
        buf.put_slice(&[0x03, 0x04]);
        let packet = decode_packet(&mut buf).unwrap().unwrap();
        assert_eq!(packet.kind, PacketKind::Data);
        assert_eq!(packet.body.as_ref(), &[1, 2, 3, 4]);
        assert!(buf.is_empty());
    }

    #[test]
    fn decode_rejects_unknown_kind() {
        let mut buf = BytesMut::from(&[0x42, 0x00, 0x00][..]);
        let err = decode_packet(&mut buf).unwrap_err();
        assert!(matches!(err, TransportError::UnexpectedPacket { kind: 0x42 }));
    }

    #[test]
    fn oversized_body_rejected() {
        let mut buf = BytesMut::new();
        let body = vec![0u8; MAX_PACKET_BODY + 1];
        let err = encode_packet(PacketKind::Data, &body, &mut buf).unwrap_err();
        assert!(matches!(err, TransportError::PacketTooLarge { .. }));
        assert!(buf.is_empty());
    }

    #[test]
    fn back_to_back_packets() {
        let mut buf = BytesMut::new();
        encode_packet(PacketKind::Ack, &[], &mut buf).unwrap();
        encode_packet(PacketKind::Data, b"fw", &mut buf).unwrap();

        let first = decode_packet(&mut buf).unwrap().unwrap();
        let second = decode_packet(&mut buf).unwrap().unwrap();
        assert_eq!(first, Packet::ack());
        assert_eq!(second.body.as_ref(), b"fw");
    }
}
