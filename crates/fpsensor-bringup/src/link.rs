//! Typed command exchanges over a [`SensorTransport`].
//!
//! Each helper performs one request (and, where the firmware answers, one
//! reply) and checks the reply's shape before handing it back. Nothing here
//! retries; a failed exchange is returned to the caller as is.

use std::time::Duration;

use bytes::Bytes;
use fpsensor_proto::command::{
    ENABLE_CHIP, FDT_MANUAL, FIRMWARE_VERSION, GET_IMAGE, PING, PRODUCTION_READ,
    PRODUCTION_WRITE, READ_OTP, SLEEP, UPLOAD_CONFIG,
};
use fpsensor_proto::production::read_request;
use fpsensor_proto::{decode_frame, encode, render_hex, Command, Frame, ProductionWrite};
use fpsensor_transport::SensorTransport;
use tracing::{debug, trace};

use crate::config::StepTimeouts;
use crate::constants::{
    ENABLE_PAYLOAD, FDT_MODE_TX_OFF, FDT_MODE_TX_ON, IMAGE_MODE_TX_OFF, IMAGE_MODE_TX_ON,
    SENSOR_HEIGHT, SENSOR_WIDTH, SLEEP_PAYLOAD,
};
use crate::error::{BringupError, Result};

/// Filler payload for queries that carry no arguments.
const EMPTY_QUERY: [u8; 2] = [0x00, 0x00];

/// Size of the IRQ status word leading an FDT reply.
const FDT_IRQ_SIZE: usize = 2;

/// A sensor reachable through a transport, with the deadlines to use.
pub struct DeviceLink<T> {
    transport: T,
    timeouts: StepTimeouts,
}

impl<T: SensorTransport> DeviceLink<T> {
    pub fn new(transport: T, timeouts: StepTimeouts) -> Self {
        Self {
            transport,
            timeouts,
        }
    }

    pub fn timeouts(&self) -> &StepTimeouts {
        &self.timeouts
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Send one message and wait only for the transport acknowledgement.
    pub fn send(&mut self, cmd: Command, payload: &[u8]) -> Result<()> {
        let ack_timeout = self.timeouts.ack();
        self.send_with_ack(cmd, payload, ack_timeout)
    }

    /// Like [`send`](Self::send) with an explicit acknowledgement deadline.
    pub fn send_with_ack(
        &mut self,
        cmd: Command,
        payload: &[u8],
        ack_timeout: Duration,
    ) -> Result<()> {
        let wire = encode(cmd, payload).map_err(|source| BringupError::MalformedFrame {
            cmd,
            source,
        })?;
        debug!(command = %cmd, len = payload.len(), "sending");
        self.transport
            .send(&wire, ack_timeout)
            .map_err(|e| BringupError::transport(format!("send {cmd}"), e))
    }

    /// Send one message and receive the reply to it.
    ///
    /// A reply that decodes but answers another command is a
    /// [`BringupError::ProtocolMismatch`].
    pub fn request(
        &mut self,
        cmd: Command,
        payload: &[u8],
        reply_timeout: Duration,
    ) -> Result<Frame> {
        self.send(cmd, payload)?;

        let raw = self
            .transport
            .receive(reply_timeout)
            .map_err(|e| BringupError::transport(format!("reply to {cmd}"), e))?;
        trace!(command = %cmd, reply = %render_hex(&raw), "received");

        let frame = decode_frame(raw).map_err(|source| BringupError::MalformedFrame { cmd, source })?;
        if !frame.is(cmd) {
            return Err(BringupError::ProtocolMismatch {
                expected: cmd,
                actual: frame.cmd(),
            });
        }
        Ok(frame)
    }

    pub fn reset(&mut self) -> Result<()> {
        self.transport
            .reset()
            .map_err(|e| BringupError::transport("device reset", e))
    }

    pub fn empty_buffer(&mut self) -> Result<()> {
        self.transport
            .empty_buffer()
            .map_err(|e| BringupError::transport("buffer drain", e))
    }

    /// Ping is answered by acknowledgement alone, so its deadline bounds the ack.
    pub fn ping(&mut self) -> Result<()> {
        self.send_with_ack(PING, &EMPTY_QUERY, Duration::from_millis(self.timeouts.ping_ms))
    }

    /// Firmware version text, truncated at the first NUL.
    pub fn firmware_version(&mut self) -> Result<String> {
        let reply = self.request(
            FIRMWARE_VERSION,
            &EMPTY_QUERY,
            Duration::from_millis(self.timeouts.firmware_ms),
        )?;
        let text = reply
            .payload
            .split(|b| *b == 0)
            .next()
            .unwrap_or_default();
        Ok(String::from_utf8_lossy(text).into_owned())
    }

    /// Enable the sensor and return its chip ID.
    pub fn enable_chip(&mut self) -> Result<u32> {
        let reply = self.request(
            ENABLE_CHIP,
            &ENABLE_PAYLOAD,
            Duration::from_millis(self.timeouts.enable_ms),
        )?;
        match reply.payload.get(..4) {
            Some(&[a, b, c, d]) => Ok(u32::from_le_bytes([a, b, c, d])),
            _ => Err(BringupError::UnexpectedReply {
                cmd: ENABLE_CHIP,
                reason: format!("chip ID needs 4 bytes, got {}", reply.payload.len()),
            }),
        }
    }

    pub fn read_otp(&mut self) -> Result<Bytes> {
        let reply = self.request(
            READ_OTP,
            &EMPTY_QUERY,
            Duration::from_millis(self.timeouts.otp_ms),
        )?;
        Ok(reply.payload)
    }

    /// Raw production-read reply for `read_type`, unparsed.
    pub fn read_production(&mut self, read_type: u16) -> Result<Bytes> {
        let reply = self.request(
            PRODUCTION_READ,
            &read_request(read_type),
            Duration::from_millis(self.timeouts.psk_read_ms),
        )?;
        Ok(reply.payload)
    }

    /// Write a production parameter; returns the device's status byte.
    pub fn write_production(&mut self, write: &ProductionWrite) -> Result<u8> {
        let reply = self.request(
            PRODUCTION_WRITE,
            &write.encode(),
            Duration::from_millis(self.timeouts.psk_write_ms),
        )?;
        reply
            .payload
            .first()
            .copied()
            .ok_or(BringupError::PskWriteFailed { status: None })
    }

    /// Upload a configuration blob. The device answers with a non-zero status
    /// byte when it accepts the blob.
    pub fn upload_config(&mut self, config: &[u8]) -> Result<()> {
        let reply = self.request(
            UPLOAD_CONFIG,
            config,
            Duration::from_millis(self.timeouts.config_ms),
        )?;
        match reply.payload.first().copied() {
            Some(status) if status != 0 => Ok(()),
            status => Err(BringupError::ConfigRejected { status }),
        }
    }

    /// Capture the FDT baseline; returns the little-endian sample bytes.
    pub fn fdt_base(&mut self, tx_enabled: bool) -> Result<Bytes> {
        let mode = if tx_enabled {
            FDT_MODE_TX_ON
        } else {
            FDT_MODE_TX_OFF
        };
        let reply = self.request(
            FDT_MANUAL,
            &[mode, 0x00],
            Duration::from_millis(self.timeouts.fdt_ms),
        )?;

        let len = reply.payload.len();
        if len < FDT_IRQ_SIZE || (len - FDT_IRQ_SIZE) % 2 != 0 {
            return Err(BringupError::UnexpectedReply {
                cmd: FDT_MANUAL,
                reason: format!("{len} bytes is not an IRQ word followed by 16-bit samples"),
            });
        }
        debug!(tx_enabled, samples = (len - FDT_IRQ_SIZE) / 2, "fdt baseline captured");
        Ok(reply.payload.slice(FDT_IRQ_SIZE..))
    }

    /// Capture one reference image as raw pixels.
    pub fn image(&mut self, tx_enabled: bool) -> Result<Bytes> {
        let mode = if tx_enabled {
            IMAGE_MODE_TX_ON
        } else {
            IMAGE_MODE_TX_OFF
        };
        let reply = self.request(
            GET_IMAGE,
            &[mode, 0x00],
            Duration::from_millis(self.timeouts.image_ms),
        )?;

        let expected = SENSOR_WIDTH * SENSOR_HEIGHT;
        if reply.payload.len() != expected {
            return Err(BringupError::UnexpectedReply {
                cmd: GET_IMAGE,
                reason: format!("expected {expected} pixels, got {}", reply.payload.len()),
            });
        }
        Ok(reply.payload)
    }

    /// Put the sensor into low-power sleep; confirmed by acknowledgement only.
    pub fn sleep(&mut self) -> Result<()> {
        self.send(SLEEP, &SLEEP_PAYLOAD)
    }
}

/// Copy of `config` with its trailing checksum word recomputed.
///
/// The blob is a run of little-endian 16-bit words whose last word makes the
/// wrapping sum of all words equal `0xA5A5`. Blobs shorter than one word are
/// returned unchanged.
pub fn prepare_config(config: &[u8]) -> Vec<u8> {
    let mut out = config.to_vec();
    if out.len() < 2 {
        return out;
    }
    let body = out.len() - 2;
    let sum = out[..body]
        .chunks_exact(2)
        .map(|w| u16::from_le_bytes([w[0], w[1]]))
        .fold(0u16, u16::wrapping_add);
    let checksum = 0xA5A5u16.wrapping_sub(sum);
    out[body..].copy_from_slice(&checksum.to_le_bytes());
    out
}
