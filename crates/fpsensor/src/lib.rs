//! Bring-up of Goodix TLS encrypted fingerprint sensors.
//!
//! # Crate Structure
//!
//! - [`transport`]: acknowledged send/receive over a sensor link
//! - [`proto`]: message framing, command table and production records
//! - [`bringup`]: integrity checks, calibration, the bring-up sequencer and a sensor emulator

/// Re-export transport types.
pub mod transport {
    pub use fpsensor_transport::*;
}

/// Re-export protocol types.
pub mod proto {
    pub use fpsensor_proto::*;
}

/// Re-export bring-up types.
pub mod bringup {
    pub use fpsensor_bringup::*;
}
