use std::fmt;
use std::io;

use fpsensor::bringup::{BringupError, BringupFailure, ConfigError};
use fpsensor::transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound | io::ErrorKind::InvalidInput => USAGE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

fn transport_code(err: &TransportError) -> i32 {
    match err {
        TransportError::Timeout { .. } => TIMEOUT,
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source)
            if source.kind() == io::ErrorKind::PermissionDenied =>
        {
            PERMISSION_DENIED
        }
        _ => TRANSPORT_ERROR,
    }
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    CliError::new(transport_code(&err), format!("{context}: {err}"))
}

fn bringup_code(err: &BringupError) -> i32 {
    match err {
        BringupError::Transport { source, .. } => transport_code(source),
        BringupError::MalformedFrame { .. }
        | BringupError::ProtocolMismatch { .. }
        | BringupError::UnexpectedReply { .. }
        | BringupError::OtpHashMismatch { .. }
        | BringupError::InvalidOtp { .. }
        | BringupError::ProductionRead(_) => DATA_INVALID,
        BringupError::UnsupportedFirmware { .. }
        | BringupError::UnsupportedChip { .. }
        | BringupError::PskWriteFailed { .. }
        | BringupError::SecureChannel(_)
        | BringupError::ConfigRejected { .. }
        | BringupError::InvalidFdtBaseline { .. }
        | BringupError::InvalidBaseImage { .. } => FAILURE,
        BringupError::MissingCalibration => INTERNAL,
    }
}

pub fn bringup_error(context: &str, failure: BringupFailure) -> CliError {
    CliError::new(bringup_code(&failure.error), format!("{context}: {failure}"))
}

pub fn device_error(context: &str, err: BringupError) -> CliError {
    CliError::new(bringup_code(&err), format!("{context}: {err}"))
}

pub fn config_error(err: ConfigError) -> CliError {
    match err {
        ConfigError::Io { path, source } => {
            io_error(&format!("failed reading {}", path.display()), source)
        }
        ConfigError::Parse { .. } => CliError::new(DATA_INVALID, err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use fpsensor::bringup::BringupState;
    use fpsensor::proto::command::{PING, READ_OTP};

    use super::*;

    fn failure(error: BringupError) -> BringupFailure {
        BringupFailure {
            state: BringupState::CheckSensor,
            error,
        }
    }

    #[test]
    fn transport_codes() {
        let timeout = TransportError::Timeout {
            op: "receive",
            after: Duration::from_millis(200),
        };
        assert_eq!(transport_error("open", timeout).code, TIMEOUT);

        let refused = TransportError::Connect {
            path: PathBuf::from("/tmp/absent.sock"),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        assert_eq!(transport_error("open", refused).code, TRANSPORT_ERROR);

        let denied = TransportError::Bind {
            path: PathBuf::from("/root/sensor.sock"),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        };
        assert_eq!(transport_error("emulate", denied).code, PERMISSION_DENIED);

        assert_eq!(transport_error("open", TransportError::Closed).code, TRANSPORT_ERROR);
    }

    #[test]
    fn bringup_codes() {
        let mismatch = failure(BringupError::ProtocolMismatch {
            expected: READ_OTP,
            actual: PING,
        });
        let err = bringup_error("open failed", mismatch);
        assert_eq!(err.code, DATA_INVALID);
        assert!(err.message.starts_with("open failed: bring-up failed at CHECK_SENSOR"));

        let chip = failure(BringupError::UnsupportedChip {
            chip_id: 0x0012_3456,
            expected_high: 0x220C,
        });
        assert_eq!(bringup_error("open failed", chip).code, FAILURE);

        let silent = failure(BringupError::Transport {
            during: "read-otp".to_string(),
            source: TransportError::Timeout {
                op: "receive",
                after: Duration::from_millis(200),
            },
        });
        assert_eq!(bringup_error("open failed", silent).code, TIMEOUT);

        assert_eq!(
            device_error("close failed", BringupError::MissingCalibration).code,
            INTERNAL
        );
    }

    #[test]
    fn config_codes() {
        let missing = ConfigError::Io {
            path: PathBuf::from("/tmp/absent.json"),
            source: io::Error::from(io::ErrorKind::NotFound),
        };
        assert_eq!(config_error(missing).code, USAGE);

        let parse = ConfigError::Parse {
            path: PathBuf::from("/tmp/bad.json"),
            source: serde_json::from_str::<u8>("nope").unwrap_err(),
        };
        let err = config_error(parse);
        assert_eq!(err.code, DATA_INVALID);
        assert!(err.message.contains("bad.json"));
    }
}
