//! The secure-channel step, supplied by the caller.
//!
//! Bring-up only needs to know whether the encrypted session came up. The
//! handshake itself lives behind [`SecureChannel`] and talks to the device
//! through the same transport the sequencer uses.

use fpsensor_transport::SensorTransport;

/// Opaque error from a secure-channel establisher, surfaced unchanged.
pub type SecureChannelError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub trait SecureChannel {
    /// Bring up the encrypted session over `transport`.
    fn establish(&mut self, transport: &mut dyn SensorTransport) -> Result<(), SecureChannelError>;
}

impl<F> SecureChannel for F
where
    F: FnMut(&mut dyn SensorTransport) -> Result<(), SecureChannelError>,
{
    fn establish(&mut self, transport: &mut dyn SensorTransport) -> Result<(), SecureChannelError> {
        self(transport)
    }
}

/// Establisher for links that are already secured below the transport.
///
/// Sends nothing and always succeeds. Used with the sensor emulator.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreEstablished;

impl SecureChannel for PreEstablished {
    fn establish(&mut self, _transport: &mut dyn SensorTransport) -> Result<(), SecureChannelError> {
        Ok(())
    }
}
