//! Protocol-level model of a 5395 sensor.
//!
//! [`SensorEmulator`] answers every bring-up command the way a healthy sensor
//! does, with knobs in [`EmulatorProfile`] to make it misbehave. It can be
//! driven in-process through [`LoopbackTransport`] or served over a real
//! stream with [`SensorEmulator::serve`].

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use fpsensor_proto::command::{
    ENABLE_CHIP, FDT_MANUAL, FIRMWARE_VERSION, GET_IMAGE, PING, PRODUCTION_READ,
    PRODUCTION_WRITE, READ_OTP, UPLOAD_CONFIG,
};
use fpsensor_proto::production::{PSK_DIGEST_READ_TYPE, PSK_WHITE_BOX_WRITE_TYPE};
use fpsensor_proto::{decode_frame, encode, Command, ProductionReadRecord, ProductionWrite};
use fpsensor_transport::{
    LinkStream, PacketKind, PacketStream, SensorTransport, TransportError,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::constants::{
    FDT_MODE_TX_OFF, IMAGE_BORDER, IMAGE_MODE_TX_OFF, SENSOR_HEIGHT, SENSOR_WIDTH,
};
use crate::verifier::expected_psk_digest;

/// OTP dump of a known-good sensor; its checksum byte (index 25) is valid.
pub const REFERENCE_OTP: [u8; 64] = [
    0x0b, 0x30, 0x55, 0x7a, 0x9f, 0xc4, 0xe9, 0x0e, 0x33, 0x58, 0x7d, 0xa2, 0xc7, 0xec, 0x11, 0x36,
    0x5b, 0x0a, 0xa5, 0xca, 0xef, 0x14, 0x30, 0x0f, 0x83, 0x47, 0xcd, 0xf2, 0x17, 0x3c, 0x61, 0x77,
    0xab, 0xd0, 0xf5, 0x1a, 0x3f, 0x64, 0x89, 0xae, 0xd3, 0xf8, 0x1d, 0x42, 0x67, 0x8c, 0xb1, 0xd6,
    0xfb, 0x20, 0x45, 0x6a, 0x8f, 0xb4, 0xd9, 0xfe, 0x23, 0x48, 0x6d, 0x92, 0xb7, 0xdc, 0x01, 0x26,
];

/// How long [`SensorEmulator::serve`] blocks before rechecking its run flag.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Behaviour of an emulated sensor. The default is a healthy, provisioned
/// device that passes every bring-up step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorProfile {
    /// Firmware version string; sent NUL-terminated.
    pub firmware: String,
    pub chip_id: u32,
    pub otp: Vec<u8>,
    /// Digest reported by a PSK production read.
    pub psk_digest: Vec<u8>,
    /// Status byte answering a PSK write; 0 means success.
    pub psk_write_status: u8,
    /// Status byte answering a config upload; non-zero means accepted.
    pub config_status: u8,
    /// Quiescent FDT samples.
    pub fdt_samples: Vec<u16>,
    /// Offset of transmitter-off FDT samples, in comparison units.
    pub fdt_drift: u16,
    /// Offset of every transmitter-on FDT capture after the first, in
    /// comparison units.
    pub second_pass_drift: u16,
    /// Pixel value of a transmitter-on image.
    pub image_level: u8,
    /// Interior offset of a transmitter-off image. Its border is saturated.
    pub image_offset: u8,
    /// Commands that are neither acknowledged nor answered.
    pub unresponsive: Vec<Command>,
    /// Commands that are acknowledged but never answered.
    pub muted: Vec<Command>,
    /// Commands whose reply carries the ping command code.
    pub misrouted: Vec<Command>,
    /// Reply payloads sent verbatim in place of the modelled ones.
    pub raw_replies: Vec<RawReply>,
}

/// A canned reply payload for one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawReply {
    pub command: Command,
    pub payload: Vec<u8>,
}

impl Default for EmulatorProfile {
    fn default() -> Self {
        Self {
            firmware: "GF5288_HTSEC_APP_10011".to_string(),
            chip_id: 0x0022_0C5A,
            otp: REFERENCE_OTP.to_vec(),
            psk_digest: expected_psk_digest().to_vec(),
            psk_write_status: 0,
            config_status: 1,
            fdt_samples: vec![
                0x0400, 0x0402, 0x03fe, 0x0410, 0x03f0, 0x0404, 0x0408, 0x03fa, 0x0400, 0x0412,
                0x03ee, 0x0406,
            ],
            fdt_drift: 0,
            second_pass_drift: 0,
            image_level: 0x80,
            image_offset: 3,
            unresponsive: Vec::new(),
            muted: Vec::new(),
            misrouted: Vec::new(),
            raw_replies: Vec::new(),
        }
    }
}

/// What the device does with one incoming message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Acknowledge, send nothing else.
    Ack,
    /// Acknowledge, then send this encoded reply.
    Reply(Bytes),
    /// Neither acknowledge nor answer.
    Silent,
}

#[derive(Debug, Clone)]
pub struct SensorEmulator {
    profile: EmulatorProfile,
    log: Vec<Command>,
    fdt_tx_on_captures: usize,
}

impl SensorEmulator {
    pub fn new(profile: EmulatorProfile) -> Self {
        Self {
            profile,
            log: Vec::new(),
            fdt_tx_on_captures: 0,
        }
    }

    pub fn profile(&self) -> &EmulatorProfile {
        &self.profile
    }

    /// Every command received so far, in order.
    pub fn received(&self) -> &[Command] {
        &self.log
    }

    pub fn reset(&mut self) {
        debug!("emulated sensor reset");
        self.fdt_tx_on_captures = 0;
    }

    /// Process one encoded message.
    pub fn handle(&mut self, raw: Bytes) -> Response {
        let frame = match decode_frame(raw) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, "dropping undecodable message");
                return Response::Ack;
            }
        };
        let cmd = frame.cmd();
        self.log.push(cmd);
        trace!(command = %cmd, len = frame.payload.len(), "emulator request");

        if self.profile.unresponsive.contains(&cmd) {
            return Response::Silent;
        }
        if self.profile.muted.contains(&cmd) {
            return Response::Ack;
        }

        let canned = self
            .profile
            .raw_replies
            .iter()
            .find(|raw| raw.command == cmd)
            .map(|raw| raw.payload.clone());
        let payload = match canned.or_else(|| self.reply_payload(cmd, &frame.payload)) {
            Some(payload) => payload,
            None => return Response::Ack,
        };
        let reply_cmd = if self.profile.misrouted.contains(&cmd) {
            PING
        } else {
            cmd
        };
        match encode(reply_cmd, &payload) {
            Ok(wire) => Response::Reply(wire),
            Err(err) => {
                warn!(command = %cmd, error = %err, "reply does not fit in one message");
                Response::Ack
            }
        }
    }

    fn reply_payload(&mut self, cmd: Command, request: &[u8]) -> Option<Vec<u8>> {
        match cmd {
            FIRMWARE_VERSION => {
                let mut text = self.profile.firmware.as_bytes().to_vec();
                text.push(0);
                Some(text)
            }
            ENABLE_CHIP => Some(self.profile.chip_id.to_le_bytes().to_vec()),
            READ_OTP => Some(self.profile.otp.clone()),
            PRODUCTION_READ => Some(self.production_read(request)),
            PRODUCTION_WRITE => Some(vec![self.production_write(request)]),
            UPLOAD_CONFIG => Some(vec![self.profile.config_status]),
            FDT_MANUAL => Some(self.fdt_capture(request.first().copied())),
            GET_IMAGE => Some(self.image_capture(request.first().copied())),
            _ => None,
        }
    }

    fn production_read(&self, request: &[u8]) -> Vec<u8> {
        let read_type = match request {
            [lo, hi, ..] => u16::from_le_bytes([*lo, *hi]),
            _ => 0,
        };
        if read_type != PSK_DIGEST_READ_TYPE {
            let [lo, hi] = read_type.to_le_bytes();
            return vec![0x01, lo, hi, 0x00, 0x00];
        }
        ProductionReadRecord::reply(read_type, &self.profile.psk_digest)
            .map(|reply| reply.to_vec())
            .unwrap_or_else(|_| vec![0x01, 0x03, 0xb0, 0x00, 0x00])
    }

    fn production_write(&mut self, request: &[u8]) -> u8 {
        let write = match ProductionWrite::decode(&Bytes::copy_from_slice(request)) {
            Some(write) => write,
            None => return 0xff,
        };
        if write.write_type == PSK_WHITE_BOX_WRITE_TYPE && self.profile.psk_write_status == 0 {
            debug!(len = write.data.len(), "emulated sensor provisioned");
            self.profile.psk_digest = expected_psk_digest().to_vec();
        }
        self.profile.psk_write_status
    }

    fn fdt_capture(&mut self, mode: Option<u8>) -> Vec<u8> {
        let offset = if mode == Some(FDT_MODE_TX_OFF) {
            self.profile.fdt_drift
        } else {
            self.fdt_tx_on_captures += 1;
            if self.fdt_tx_on_captures > 1 {
                self.profile.second_pass_drift
            } else {
                0
            }
        };

        let mut reply = vec![0x00, 0x00];
        for sample in &self.profile.fdt_samples {
            let value = sample.wrapping_add(offset.wrapping_mul(2));
            reply.extend_from_slice(&value.to_le_bytes());
        }
        reply
    }

    fn image_capture(&self, mode: Option<u8>) -> Vec<u8> {
        let level = self.profile.image_level;
        if mode != Some(IMAGE_MODE_TX_OFF) {
            return vec![level; SENSOR_WIDTH * SENSOR_HEIGHT];
        }

        let interior = level.saturating_add(self.profile.image_offset);
        (0..SENSOR_WIDTH * SENSOR_HEIGHT)
            .map(|i| {
                let (row, col) = (i / SENSOR_WIDTH, i % SENSOR_WIDTH);
                let border = row < IMAGE_BORDER
                    || row >= SENSOR_HEIGHT - IMAGE_BORDER
                    || col < IMAGE_BORDER
                    || col >= SENSOR_WIDTH - IMAGE_BORDER;
                if border {
                    0xff
                } else {
                    interior
                }
            })
            .collect()
    }

    /// Serve the device side of a packet link until `running` is cleared or
    /// the host closes the link.
    pub fn serve<S: LinkStream>(
        &mut self,
        link: &mut PacketStream<S>,
        running: &AtomicBool,
    ) -> fpsensor_transport::Result<()> {
        while running.load(Ordering::SeqCst) {
            let packet = match link.read_packet(Some(POLL_INTERVAL), "request") {
                Ok(packet) => packet,
                Err(err) if err.is_timeout() => continue,
                Err(TransportError::Closed) => {
                    debug!("host closed the link");
                    return Ok(());
                }
                Err(err) => return Err(err),
            };

            match packet.kind {
                PacketKind::Reset => {
                    self.reset();
                    link.write_packet(PacketKind::Ack, &[])?;
                }
                PacketKind::Data => match self.handle(packet.body) {
                    Response::Silent => {}
                    Response::Ack => link.write_packet(PacketKind::Ack, &[])?,
                    Response::Reply(reply) => {
                        link.write_packet(PacketKind::Ack, &[])?;
                        link.write_packet(PacketKind::Data, &reply)?;
                    }
                },
                PacketKind::Ack => trace!("ignoring acknowledgement from host"),
            }
        }
        Ok(())
    }
}

/// In-memory [`SensorTransport`] wired straight to a [`SensorEmulator`].
///
/// A silent command makes `send` time out; an empty reply queue makes
/// `receive` time out. Neither waits for the deadline to pass.
#[derive(Debug, Clone)]
pub struct LoopbackTransport {
    emulator: SensorEmulator,
    inbox: VecDeque<Bytes>,
}

impl LoopbackTransport {
    pub fn new(profile: EmulatorProfile) -> Self {
        Self {
            emulator: SensorEmulator::new(profile),
            inbox: VecDeque::new(),
        }
    }

    /// Every command the host has sent, in order.
    pub fn sent_commands(&self) -> &[Command] {
        self.emulator.received()
    }

    pub fn emulator(&self) -> &SensorEmulator {
        &self.emulator
    }
}

impl SensorTransport for LoopbackTransport {
    fn send(&mut self, message: &[u8], ack_timeout: Duration) -> fpsensor_transport::Result<()> {
        match self.emulator.handle(Bytes::copy_from_slice(message)) {
            Response::Silent => Err(TransportError::Timeout {
                op: "send acknowledgement",
                after: ack_timeout,
            }),
            Response::Ack => Ok(()),
            Response::Reply(reply) => {
                self.inbox.push_back(reply);
                Ok(())
            }
        }
    }

    fn receive(&mut self, timeout: Duration) -> fpsensor_transport::Result<Bytes> {
        self.inbox.pop_front().ok_or(TransportError::Timeout {
            op: "receive",
            after: timeout,
        })
    }

    fn reset(&mut self) -> fpsensor_transport::Result<()> {
        self.emulator.reset();
        self.inbox.clear();
        Ok(())
    }

    fn empty_buffer(&mut self) -> fpsensor_transport::Result<()> {
        self.inbox.clear();
        Ok(())
    }
}
