//! Command/response message codec for the sensor protocol.
//!
//! Every exchange carries one message:
//! - a category byte
//! - a command byte
//! - a payload whose length travels out of band in the transport
//!
//! The codec is stateless. Replies come from untrusted hardware, so decoding
//! checks every length before touching the bytes it describes.

pub mod command;
pub mod codec;
pub mod error;
pub mod production;

pub use codec::{
    decode_frame, decode_with_length, encode, encode_frame, render_hex, Frame, HEADER_SIZE,
    MAX_FRAME_SIZE, MAX_PAYLOAD,
};
pub use command::{command_name, Command};
pub use error::{ProtoError, RecordError, Result};
pub use production::{ProductionReadRecord, ProductionWrite, RECORD_HEADER_SIZE};
