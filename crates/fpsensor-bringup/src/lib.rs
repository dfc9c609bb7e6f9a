//! Bring-up of Goodix 5395 encrypted fingerprint sensors.
//!
//! Takes a sensor from power-on to a calibrated, scan-ready state:
//! - authenticates firmware, chip and OTP
//! - provisions the pre-shared key when missing
//! - validates the FDT baseline and reference image before storing them
//!
//! The [`Bringup`] state machine drives everything through a
//! [`SensorTransport`](fpsensor_transport::SensorTransport). A
//! [`SensorEmulator`] stands in for hardware in tests and tooling.

pub mod adapter;
pub mod calibration;
pub mod config;
pub mod constants;
pub mod emulator;
pub mod error;
pub mod link;
pub mod secure;
pub mod sequencer;
pub mod verifier;

pub use adapter::{DeviceDescriptor, ImageDevice, ScanType, GOODIX_5395};
pub use calibration::{
    fdt_base_is_valid, generate_fdt_base, image_is_valid, max_fdt_delta, mean_image_delta,
    CalibrationParams,
};
pub use config::{BringupConfig, StepTimeouts};
pub use emulator::{
    EmulatorProfile, LoopbackTransport, RawReply, Response, SensorEmulator, REFERENCE_OTP,
};
pub use error::{BringupError, BringupFailure, ConfigError, Result};
pub use link::{prepare_config, DeviceLink};
pub use secure::{PreEstablished, SecureChannel, SecureChannelError};
pub use sequencer::{Bringup, BringupState, OpenedDevice, StepOutcome, StepRecord};
pub use verifier::{expected_psk_digest, otp_checksum, psk_matches, sha256, verify_otp};
