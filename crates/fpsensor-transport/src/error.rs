use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur in sensor transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The operation did not complete before its deadline.
    #[error("{op} timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },

    /// Failed to bind to the specified address.
    #[error("failed to bind to {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the underlying stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// A link packet body exceeds what the length field can express.
    #[error("packet body too large ({size} bytes, max {max})")]
    PacketTooLarge { size: usize, max: usize },

    /// A packet of an unknown or unexpected kind arrived.
    #[error("unexpected link packet kind 0x{kind:02x}")]
    UnexpectedPacket { kind: u8 },

    /// The peer closed the link.
    #[error("link closed")]
    Closed,
}

impl TransportError {
    /// True when the error is a deadline expiry rather than a hard failure.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
