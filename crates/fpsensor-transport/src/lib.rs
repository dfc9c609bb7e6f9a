//! Byte-level transport to an encrypted fingerprint sensor.
//!
//! Everything above this layer talks to the sensor through the
//! [`SensorTransport`] trait:
//! - acknowledged sends bounded by a timeout
//! - receives bounded by a timeout
//! - device reset and host-side buffer draining
//!
//! The message payload length is carried here, out of band, so the protocol
//! frame above never embeds it. [`StreamTransport`] implements the trait over
//! any byte stream using small length-prefixed link packets.

pub mod error;
pub mod packet;
pub mod stream;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use packet::{Packet, PacketKind, MAX_PACKET_BODY, PACKET_HEADER_SIZE};
pub use stream::{LinkStream, PacketStream, StreamTransport, TransportConfig};
pub use traits::SensorTransport;

#[cfg(unix)]
pub use uds::SensorSocket;
