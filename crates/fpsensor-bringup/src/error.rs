use std::path::PathBuf;

use fpsensor_proto::{Command, ProtoError, RecordError};
use fpsensor_transport::TransportError;

use crate::secure::SecureChannelError;
use crate::sequencer::BringupState;

/// Errors raised by a single bring-up step.
#[derive(Debug, thiserror::Error)]
pub enum BringupError {
    /// Send, receive, reset or timeout failure reported by the transport.
    #[error("transport error during {during}: {source}")]
    Transport {
        during: String,
        source: TransportError,
    },

    /// The reply bytes could not be decoded into a message.
    #[error("{cmd} reply could not be decoded: {source}")]
    MalformedFrame { cmd: Command, source: ProtoError },

    /// The device runs a firmware build this sequence does not support.
    #[error("firmware {version:?} is not supported")]
    UnsupportedFirmware { version: String },

    /// The chip ID does not belong to the supported sensor family.
    #[error("unsupported chip ID 0x{chip_id:x} (expected 0x{expected_high:x}xx)")]
    UnsupportedChip { chip_id: u32, expected_high: u32 },

    /// The reply answers a different command than the one sent.
    #[error("expected reply to {expected}, received {actual}")]
    ProtocolMismatch { expected: Command, actual: Command },

    /// The reply answers the right command but its payload has the wrong shape.
    #[error("unexpected {cmd} reply: {reason}")]
    UnexpectedReply { cmd: Command, reason: String },

    /// The OTP dump failed its integrity check.
    #[error("OTP hash incorrect for {otp}")]
    OtpHashMismatch { otp: String },

    /// The OTP dump is too short to derive calibration parameters.
    #[error("OTP dump too short ({len} bytes, need {min})")]
    InvalidOtp { len: usize, min: usize },

    /// The production-parameter record is inconsistent.
    #[error("production read failed: {0}")]
    ProductionRead(#[from] RecordError),

    /// The device refused the white-box PSK.
    #[error("production write of PSK failed (status {status:?})")]
    PskWriteFailed { status: Option<u8> },

    /// The secure-channel establisher failed.
    #[error("secure channel establishment failed: {0}")]
    SecureChannel(#[source] SecureChannelError),

    /// The device refused the factory configuration.
    #[error("factory config rejected (status {status:?})")]
    ConfigRejected { status: Option<u8> },

    /// Transmitter-on and transmitter-off FDT captures disagree.
    #[error(
        "invalid FDT baseline on pass {pass}: worst delta {worst_delta:?} exceeds {max_delta}"
    )]
    InvalidFdtBaseline {
        pass: u8,
        worst_delta: Option<u16>,
        max_delta: u16,
    },

    /// Transmitter-on and transmitter-off reference images disagree.
    #[error("invalid base image: mean delta {mean_delta:?} exceeds {threshold}")]
    InvalidBaseImage {
        mean_delta: Option<f64>,
        threshold: u32,
    },

    /// Baseline capture ran before the sensor check produced calibration.
    #[error("calibration parameters are not initialised")]
    MissingCalibration,
}

impl BringupError {
    pub(crate) fn transport(during: impl Into<String>, source: TransportError) -> Self {
        Self::Transport {
            during: during.into(),
            source,
        }
    }
}

/// A failed bring-up: the first failing state and the error it raised.
#[derive(Debug, thiserror::Error)]
#[error("bring-up failed at {state}: {error}")]
pub struct BringupFailure {
    pub state: BringupState,
    #[source]
    pub error: BringupError,
}

/// Errors loading a [`BringupConfig`](crate::config::BringupConfig).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, BringupError>;
