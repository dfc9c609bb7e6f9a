use std::time::Duration;

use bytes::Bytes;

use crate::error::Result;

/// The primitives a sensor session needs from the wire.
///
/// Implementations are driven from a single thread of control: at most one
/// exchange is in flight at any time. Every blocking call is bounded by the
/// timeout it is given and fails with [`TransportError::Timeout`] when the
/// deadline passes.
///
/// [`TransportError::Timeout`]: crate::TransportError::Timeout
pub trait SensorTransport {
    /// Send one encoded message and wait for the device to acknowledge it.
    fn send(&mut self, message: &[u8], ack_timeout: Duration) -> Result<()>;

    /// Receive the next encoded message from the device.
    fn receive(&mut self, timeout: Duration) -> Result<Bytes>;

    /// Reset the device side of the link.
    fn reset(&mut self) -> Result<()>;

    /// Discard anything the host has buffered but not yet consumed.
    fn empty_buffer(&mut self) -> Result<()>;
}

impl<T: SensorTransport + ?Sized> SensorTransport for &mut T {
    fn send(&mut self, message: &[u8], ack_timeout: Duration) -> Result<()> {
        (**self).send(message, ack_timeout)
    }

    fn receive(&mut self, timeout: Duration) -> Result<Bytes> {
        (**self).receive(timeout)
    }

    fn reset(&mut self) -> Result<()> {
        (**self).reset()
    }

    fn empty_buffer(&mut self) -> Result<()> {
        (**self).empty_buffer()
    }
}

impl<T: SensorTransport + ?Sized> SensorTransport for Box<T> {
    fn send(&mut self, message: &[u8], ack_timeout: Duration) -> Result<()> {
        (**self).send(message, ack_timeout)
    }

    fn receive(&mut self, timeout: Duration) -> Result<Bytes> {
        (**self).receive(timeout)
    }

    fn reset(&mut self) -> Result<()> {
        (**self).reset()
    }

    fn empty_buffer(&mut self) -> Result<()> {
        (**self).empty_buffer()
    }
}
