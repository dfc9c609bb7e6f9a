use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace};

use crate::error::{Result, TransportError};
use crate::packet::{decode_packet, encode_packet, Packet, PacketKind};
use crate::traits::SensorTransport;

const INITIAL_BUFFER_CAPACITY: usize = 16 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// A byte stream whose reads can be bounded in time.
pub trait LinkStream: Read + Write {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()>;
}

#[cfg(unix)]
impl LinkStream for std::os::unix::net::UnixStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        std::os::unix::net::UnixStream::set_read_timeout(self, timeout)
    }
}

impl LinkStream for std::net::TcpStream {
    fn set_read_timeout(&self, timeout: Option<Duration>) -> std::io::Result<()> {
        std::net::TcpStream::set_read_timeout(self, timeout)
    }
}

/// Reads and writes whole link packets over a [`LinkStream`].
///
/// Partial reads are buffered internally; callers always get complete packets.
/// Used directly by the device side of a link and wrapped by
/// [`StreamTransport`] on the host side.
pub struct PacketStream<S> {
    inner: S,
    rx: BytesMut,
    tx: BytesMut,
}

impl<S: LinkStream> PacketStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            rx: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            tx: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Encode and write one packet.
    pub fn write_packet(&mut self, kind: PacketKind, body: &[u8]) -> Result<()> {
        self.tx.clear();
        encode_packet(kind, body, &mut self.tx)?;
        match self.inner.write_all(&self.tx) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::BrokenPipe => return Err(TransportError::Closed),
            Err(err) => return Err(TransportError::Io(err)),
        }
        self.inner.flush()?;
        trace!(kind = ?kind, len = body.len(), "packet written");
        Ok(())
    }

    /// Read the next complete packet.
    ///
    /// `timeout` of `None` blocks until a packet or EOF arrives.
    pub fn read_packet(&mut self, timeout: Option<Duration>, op: &'static str) -> Result<Packet> {
        let deadline = timeout.map(|limit| (Instant::now() + limit, limit));
        loop {
            if let Some(packet) = decode_packet(&mut self.rx)? {
                return Ok(packet);
            }

            let wait = match deadline {
                Some((at, limit)) => match at.checked_duration_since(Instant::now()) {
                    Some(left) if !left.is_zero() => Some(left),
                    _ => return Err(TransportError::Timeout { op, after: limit }),
                },
                None => None,
            };
            self.inner.set_read_timeout(wait)?;

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            match self.inner.read(&mut chunk) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => self.rx.extend_from_slice(&chunk[..n]),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
                {
                    continue
                }
                Err(err) if err.kind() == ErrorKind::ConnectionReset => {
                    return Err(TransportError::Closed)
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    /// Drop every buffered byte that has not been decoded yet.
    pub fn discard_buffered(&mut self) -> usize {
        let dropped = self.rx.len();
        self.rx.clear();
        dropped
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

/// Timing knobs for [`StreamTransport`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// How long a reset may wait for the device acknowledgement.
    pub reset_timeout: Duration,
    /// Quiet period that ends a buffer drain.
    pub drain_window: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            reset_timeout: Duration::from_millis(500),
            drain_window: Duration::from_millis(10),
        }
    }
}

/// Host side of a packet link, implementing [`SensorTransport`].
///
/// A `Data` packet that arrives while a send is still waiting for its
/// acknowledgement is queued and handed out by the next `receive`.
pub struct StreamTransport<S> {
    link: PacketStream<S>,
    pending: VecDeque<Bytes>,
    config: TransportConfig,
}

impl<S: LinkStream> StreamTransport<S> {
    pub fn new(inner: S) -> Self {
        Self::with_config(inner, TransportConfig::default())
    }

    pub fn with_config(inner: S, config: TransportConfig) -> Self {
        Self {
            link: PacketStream::new(inner),
            pending: VecDeque::new(),
            config,
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn into_inner(self) -> S {
        self.link.into_inner()
    }

    fn await_ack(&mut self, limit: Duration, op: &'static str) -> Result<()> {
        let deadline = Instant::now() + limit;
        loop {
            let left = remaining(deadline).ok_or(TransportError::Timeout { op, after: limit })?;
            let packet = self.link.read_packet(Some(left), op)?;
            match packet.kind {
                PacketKind::Ack => return Ok(()),
                PacketKind::Data => {
                    trace!(len = packet.body.len(), "queueing reply received before ack");
                    self.pending.push_back(packet.body);
                }
                PacketKind::Reset => {
                    return Err(TransportError::UnexpectedPacket {
                        kind: PacketKind::Reset as u8,
                    })
                }
            }
        }
    }
}

impl<S: LinkStream> SensorTransport for StreamTransport<S> {
    fn send(&mut self, message: &[u8], ack_timeout: Duration) -> Result<()> {
        self.link.write_packet(PacketKind::Data, message)?;
        self.await_ack(ack_timeout, "send acknowledgement")
    }

    fn receive(&mut self, timeout: Duration) -> Result<Bytes> {
        if let Some(body) = self.pending.pop_front() {
            return Ok(body);
        }

        let deadline = Instant::now() + timeout;
        loop {
            let left = remaining(deadline).ok_or(TransportError::Timeout {
                op: "receive",
                after: timeout,
            })?;
            let packet = self.link.read_packet(Some(left), "receive")?;
            match packet.kind {
                PacketKind::Data => return Ok(packet.body),
                PacketKind::Ack => debug!("ignoring stray acknowledgement"),
                PacketKind::Reset => {
                    return Err(TransportError::UnexpectedPacket {
                        kind: PacketKind::Reset as u8,
                    })
                }
            }
        }
    }

    fn reset(&mut self) -> Result<()> {
        self.link.write_packet(PacketKind::Reset, &[])?;
        let limit = self.config.reset_timeout;
        self.await_ack(limit, "reset")?;
        self.pending.clear();
        debug!("device reset acknowledged");
        Ok(())
    }

    fn empty_buffer(&mut self) -> Result<()> {
        let mut dropped = self.pending.len();
        self.pending.clear();
        dropped += usize::from(self.link.discard_buffered() > 0);

        loop {
            match self.link.read_packet(Some(self.config.drain_window), "drain") {
                Ok(_) => dropped += 1,
                Err(TransportError::Timeout { .. }) => break,
                Err(err) => return Err(err),
            }
        }

        if dropped > 0 {
            debug!(dropped, "emptied transport buffer");
        }
        Ok(())
    }
}

fn remaining(deadline: Instant) -> Option<Duration> {
    deadline
        .checked_duration_since(Instant::now())
        .filter(|left| !left.is_zero())
}

#[cfg(all(test, unix))]
mod tests {
    use std::os::unix::net::UnixStream;
    use std::thread;

    use super::*;

    #[test]
    fn send_waits_for_ack_then_receives_reply() {
        let (host, device) = UnixStream::pair().unwrap();

        let device = thread::spawn(move || {
            let mut link = PacketStream::new(device);
            let packet = link.read_packet(None, "device").unwrap();
            assert_eq!(packet.kind, PacketKind::Data);
            assert_eq!(packet.body.as_ref(), &[0x0a, 0x04, 0x00, 0x00]);
            link.write_packet(PacketKind::Ack, &[]).unwrap();
            link.write_packet(PacketKind::Data, b"reply").unwrap();
        });

        let mut transport = StreamTransport::new(host);
        transport
            .send(&[0x0a, 0x04, 0x00, 0x00], Duration::from_millis(500))
            .unwrap();
        let reply = transport.receive(Duration::from_millis(500)).unwrap();
        assert_eq!(reply.as_ref(), b"reply");

        device.join().unwrap();
    }

    #[test]
    fn reply_before_ack_is_queued() {
        let (host, device) = UnixStream::pair().unwrap();

        let device = thread::spawn(move || {
            let mut link = PacketStream::new(device);
            link.read_packet(None, "device").unwrap();
            link.write_packet(PacketKind::Data, b"early").unwrap();
            link.write_packet(PacketKind::Ack, &[]).unwrap();
        });

        let mut transport = StreamTransport::new(host);
        transport.send(&[0, 0], Duration::from_millis(500)).unwrap();
        let reply = transport.receive(Duration::from_millis(10)).unwrap();
        assert_eq!(reply.as_ref(), b"early");

        device.join().unwrap();
    }

    #[test]
    fn missing_ack_times_out() {
        let (host, _device) = UnixStream::pair().unwrap();
        let mut transport = StreamTransport::new(host);

        let err = transport.send(&[0, 0], Duration::from_millis(20)).unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn receive_times_out_without_data() {
        let (host, _device) = UnixStream::pair().unwrap();
        let mut transport = StreamTransport::new(host);

        let err = transport.receive(Duration::from_millis(20)).unwrap_err();
        assert!(matches!(
            err,
            TransportError::Timeout { op: "receive", .. }
        ));
    }

    #[test]
    fn closed_link_reported() {
        let (host, device) = UnixStream::pair().unwrap();
        drop(device);
        let mut transport = StreamTransport::new(host);

        let err = transport.receive(Duration::from_millis(200)).unwrap_err();
        assert!(matches!(err, TransportError::Closed));
    }

    #[test]
    fn reset_requires_ack() {
        let (host, device) = UnixStream::pair().unwrap();

        let device = thread::spawn(move || {
            let mut link = PacketStream::new(device);
            let packet = link.read_packet(None, "device").unwrap();
            assert_eq!(packet.kind, PacketKind::Reset);
            link.write_packet(PacketKind::Ack, &[]).unwrap();
        });

        let mut transport = StreamTransport::new(host);
        transport.reset().unwrap();
        device.join().unwrap();
    }

    #[test]
    fn empty_buffer_drops_stale_replies() {
        let (host, device) = UnixStream::pair().unwrap();
        let mut device = PacketStream::new(device);
        device.write_packet(PacketKind::Data, b"stale-1").unwrap();
        device.write_packet(PacketKind::Data, b"stale-2").unwrap();

        let mut transport = StreamTransport::new(host);
        transport.empty_buffer().unwrap();

        device.write_packet(PacketKind::Data, b"fresh").unwrap();
        let reply = transport.receive(Duration::from_millis(200)).unwrap();
        assert_eq!(reply.as_ref(), b"fresh");
    }
}
