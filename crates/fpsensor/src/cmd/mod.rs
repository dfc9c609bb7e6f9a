use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod emulate;
pub mod open;
pub mod verify_otp;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run bring-up against a socket-attached sensor.
    Open(OpenArgs),
    /// Serve an emulated sensor on a Unix socket.
    Emulate(EmulateArgs),
    /// Check an OTP dump offline and show the calibration it yields.
    VerifyOtp(VerifyOtpArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Open(args) => open::run(args, format),
        Command::Emulate(args) => emulate::run(args, format),
        Command::VerifyOtp(args) => verify_otp::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct OpenArgs {
    /// Socket path of the sensor.
    pub path: PathBuf,
    /// JSON bring-up config; absent fields keep their defaults.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// How long to keep retrying the connection (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
    /// Close the device after a successful open.
    #[arg(long)]
    pub close: bool,
}

#[derive(Args, Debug)]
pub struct EmulateArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// JSON emulator profile.
    #[arg(long, value_name = "FILE", conflicts_with_all = ["firmware", "chip_id", "unprovisioned"])]
    pub profile: Option<PathBuf>,
    /// Firmware version string to report.
    #[arg(long)]
    pub firmware: Option<String>,
    /// Chip ID to report (hex, e.g. 0x00220c5a).
    #[arg(long, value_parser = parse_hex_u32)]
    pub chip_id: Option<u32>,
    /// Start without a provisioned PSK.
    #[arg(long)]
    pub unprovisioned: bool,
    /// Exit after serving N host sessions.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VerifyOtpArgs {
    /// OTP dump as hex; whitespace and colons are ignored.
    pub hex: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = match input.strip_suffix("ms") {
        Some(num) => (num, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

fn parse_hex_u32(input: &str) -> Result<u32, String> {
    let digits = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);
    u32::from_str_radix(digits, 16).map_err(|err| format!("invalid hex value {input:?}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds() {
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("2").unwrap(), Duration::from_secs(2));
    }

    #[test]
    fn parse_duration_millis() {
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
    }

    #[test]
    fn parse_duration_invalid() {
        for input in ["", "0s", "bad", "5m", "-1s"] {
            let err = parse_duration(input).unwrap_err();
            assert_eq!(err.code, USAGE, "{input:?}");
        }
    }

    #[test]
    fn parse_hex_chip_ids() {
        assert_eq!(parse_hex_u32("0x00220c5a"), Ok(0x0022_0C5A));
        assert_eq!(parse_hex_u32("220C01"), Ok(0x0022_0C01));
        assert!(parse_hex_u32("0x").is_err());
        assert!(parse_hex_u32("123456789").is_err());
    }
}
