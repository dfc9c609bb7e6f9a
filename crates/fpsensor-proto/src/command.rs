//! Command codes spoken by the sensor firmware.
//!
//! A reply echoes the category and command of the request it answers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A `(category, command)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Command {
    pub category: u8,
    pub command: u8,
}

impl Command {
    pub const fn new(category: u8, command: u8) -> Self {
        Self { category, command }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (0x{:02x}/0x{:02x})",
            command_name(*self),
            self.category,
            self.command
        )
    }
}

/// Link liveness probe.
pub const PING: Command = Command::new(0x00, 0x00);

/// Capture one raw image.
pub const GET_IMAGE: Command = Command::new(0x02, 0x00);

/// Manual finger-detect (FDT) baseline capture.
pub const FDT_MANUAL: Command = Command::new(0x03, 0x03);

/// Enter low-power sleep.
pub const SLEEP: Command = Command::new(0x06, 0x00);

/// Enable the sensor and read back the chip ID.
pub const ENABLE_CHIP: Command = Command::new(0x08, 0x01);

/// Upload the factory configuration blob.
pub const UPLOAD_CONFIG: Command = Command::new(0x09, 0x00);

/// Dump the one-time-programmable memory.
pub const READ_OTP: Command = Command::new(0x0A, 0x03);

/// Query the firmware version string.
pub const FIRMWARE_VERSION: Command = Command::new(0x0A, 0x04);

/// Write a production parameter.
pub const PRODUCTION_WRITE: Command = Command::new(0x0E, 0x01);

/// Read a production parameter.
pub const PRODUCTION_READ: Command = Command::new(0x0E, 0x02);

/// Returns a human-readable name for a command.
pub fn command_name(cmd: Command) -> &'static str {
    match cmd {
        PING => "ping",
        GET_IMAGE => "get-image",
        FDT_MANUAL => "fdt-manual",
        SLEEP => "sleep",
        ENABLE_CHIP => "enable-chip",
        UPLOAD_CONFIG => "upload-config",
        READ_OTP => "read-otp",
        FIRMWARE_VERSION => "firmware-version",
        PRODUCTION_WRITE => "production-write",
        PRODUCTION_READ => "production-read",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_known_commands() {
        assert_eq!(command_name(READ_OTP), "read-otp");
        assert_eq!(command_name(Command::new(0x0E, 0x02)), "production-read");
        assert_eq!(command_name(Command::new(0x7F, 0x7F)), "unknown");
    }

    #[test]
    fn display_includes_codes() {
        assert_eq!(
            FIRMWARE_VERSION.to_string(),
            "firmware-version (0x0a/0x04)"
        );
    }
}
