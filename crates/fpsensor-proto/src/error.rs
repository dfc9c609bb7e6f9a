/// Errors that can occur while encoding or decoding messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    /// The raw bytes do not form a valid message.
    #[error("malformed frame: {reason}")]
    MalformedFrame { reason: String },

    /// The payload does not fit in one transport message.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

/// Structural or semantic violations in a production-parameter record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// The reply is shorter than the record header.
    #[error("production record truncated ({len} bytes, header needs {min})")]
    Truncated { len: usize, min: usize },

    /// The device reported a non-zero read status.
    #[error("production read failed with status 0x{0:02x}")]
    Status(u8),

    /// The record describes a different parameter than the one requested.
    #[error("wrong read type in reply, expected 0x{expected:04x}, received 0x{actual:04x}")]
    ReadType { expected: u16, actual: u16 },

    /// The declared data size disagrees with the bytes actually present.
    #[error("record declares {declared} data bytes but carries {actual}")]
    SizeMismatch { declared: usize, actual: usize },
}

pub type Result<T> = std::result::Result<T, ProtoError>;
