//! Byte-stream link framing.
//!
//! Frames on the wire:
//!
//! ```text
//! ┌──────────┬──────────────┬───────────────┬──────────────────────────┐
//! │ AA 55    │ len: u16 BE  │ message       │ crc32: u32 BE            │
//! │ 2 bytes  │ 2 bytes      │ len bytes     │ over len + message       │
//! └──────────┴──────────────┴───────────────┴──────────────────────────┘
//! ```
//!
//! The receiver hunts for the sync word, so line noise between frames costs
//! nothing but the noise itself. A bad length or checksum drops the sync word
//! and reports the error; the next receive resumes hunting right after it.

use std::{
    io::{self, Read, Write},
    net::{TcpStream, ToSocketAddrs},
    time::{Duration, Instant},
};

use bytes::{Buf, Bytes, BytesMut};
use powertrain_core::{FrameTransport, ReceiveOutcome, TransportError};
use powertrain_proto::MAX_FRAME_SIZE;

use crate::error::HostError;

/// Frame start marker.
pub const SYNC: [u8; 2] = [0xAA, 0x55];

const LEN_SIZE: usize = 2;
const CRC_SIZE: usize = 4;
const PREFIX_SIZE: usize = SYNC.len() + LEN_SIZE;

/// Largest frame on the wire, framing included.
pub const MAX_WIRE_SIZE: usize = PREFIX_SIZE + MAX_FRAME_SIZE + CRC_SIZE;

/// Shortest read timeout applied to TCP bridges.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Append one framed message to `dst`.
///
/// # Errors
///
/// `TransportError::FrameTooLarge` if `message` exceeds [`MAX_FRAME_SIZE`].
pub fn write_frame(message: &[u8], dst: &mut Vec<u8>) -> Result<(), TransportError> {
    if message.len() > MAX_FRAME_SIZE {
        return Err(TransportError::FrameTooLarge { size: message.len(), max: MAX_FRAME_SIZE });
    }

    let start = dst.len();
    dst.extend_from_slice(&SYNC);
    dst.extend_from_slice(&(message.len() as u16).to_be_bytes());
    dst.extend_from_slice(message);

    let crc = crc32fast::hash(&dst[start + SYNC.len()..]);
    dst.extend_from_slice(&crc.to_be_bytes());
    Ok(())
}

/// [`FrameTransport`] over any byte stream.
///
/// The stream must not block indefinitely on read: give it a short read
/// timeout (or make it non-blocking). `receive` polls it until a frame is
/// complete or the receive window has elapsed, so a receive can overrun its
/// window by up to one read timeout.
#[derive(Debug)]
pub struct StreamTransport<S> {
    stream: S,
    rx: BytesMut,
    tx: Vec<u8>,
}

impl<S: Read + Write> StreamTransport<S> {
    /// Wrap a stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            rx: BytesMut::with_capacity(2 * MAX_WIRE_SIZE),
            tx: Vec::with_capacity(MAX_WIRE_SIZE),
        }
    }

    /// Underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Bytes received but not yet framed.
    pub fn buffered(&self) -> usize {
        self.rx.len()
    }

    /// Extract the next complete frame from the receive buffer.
    fn parse_frame(&mut self) -> Result<Option<Bytes>, TransportError> {
        match self.rx.windows(SYNC.len()).position(|window| window == SYNC) {
            Some(offset) => self.rx.advance(offset),
            None => {
                // Keep a trailing first sync byte; its partner may be in flight
                let keep = usize::from(self.rx.last() == Some(&SYNC[0]));
                let discard = self.rx.len() - keep;
                self.rx.advance(discard);
                return Ok(None);
            },
        }

        if self.rx.len() < PREFIX_SIZE {
            return Ok(None);
        }

        let len = u16::from_be_bytes([self.rx[2], self.rx[3]]) as usize;
        if len > MAX_FRAME_SIZE {
            self.rx.advance(SYNC.len());
            return Err(TransportError::FrameTooLarge { size: len, max: MAX_FRAME_SIZE });
        }

        let total = PREFIX_SIZE + len + CRC_SIZE;
        if self.rx.len() < total {
            return Ok(None);
        }

        let crc_at = PREFIX_SIZE + len;
        let expected = u32::from_be_bytes([
            self.rx[crc_at],
            self.rx[crc_at + 1],
            self.rx[crc_at + 2],
            self.rx[crc_at + 3],
        ]);
        let actual = crc32fast::hash(&self.rx[SYNC.len()..crc_at]);
        if expected != actual {
            self.rx.advance(SYNC.len());
            return Err(TransportError::Checksum { expected, actual });
        }

        let mut frame = self.rx.split_to(total);
        frame.advance(PREFIX_SIZE);
        frame.truncate(len);
        Ok(Some(frame.freeze()))
    }

    /// Read whatever the stream has. Returns false if nothing arrived.
    fn fill(&mut self) -> Result<bool, TransportError> {
        let mut chunk = [0u8; 256];
        match self.stream.read(&mut chunk) {
            Ok(0) => Err(TransportError::Disconnected),
            Ok(n) => {
                self.rx.extend_from_slice(&chunk[..n]);
                Ok(true)
            },
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(false)
            },
            Err(e) => Err(e.into()),
        }
    }
}

impl<S: Read + Write> FrameTransport for StreamTransport<S> {
    fn receive(&mut self, timeout: Duration) -> Result<ReceiveOutcome, TransportError> {
        let deadline = Instant::now() + timeout;
        let mut expired = false;

        // Always read at least once, so a zero window still polls the stream
        loop {
            if let Some(frame) = self.parse_frame()? {
                return Ok(ReceiveOutcome::Frame(frame));
            }

            if expired {
                return Ok(ReceiveOutcome::Timeout);
            }

            self.fill()?;
            expired = Instant::now() >= deadline;
        }
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        self.tx.clear();
        write_frame(frame, &mut self.tx)?;

        self.stream.write_all(&self.tx)?;
        self.stream.flush()?;
        Ok(())
    }
}

/// Connect to a TCP serial bridge (ser2net, bench simulator).
///
/// `poll_interval` becomes the socket read timeout and bounds how far a
/// receive can overrun its window.
///
/// # Errors
///
/// `HostError::Connect` if the bridge cannot be reached or configured.
pub fn connect_tcp(
    addr: impl ToSocketAddrs,
    poll_interval: Duration,
) -> Result<StreamTransport<TcpStream>, HostError> {
    let stream = TcpStream::connect(addr).map_err(|e| HostError::Connect(e.to_string()))?;
    configure_stream(&stream, poll_interval).map_err(|e| HostError::Connect(e.to_string()))?;

    Ok(StreamTransport::new(stream))
}

/// Apply link socket options: no Nagle delay, short read timeout.
///
/// # Errors
///
/// Returns the socket error if an option cannot be set.
pub fn configure_stream(stream: &TcpStream, poll_interval: Duration) -> io::Result<()> {
    stream.set_nodelay(true)?;
    stream.set_read_timeout(Some(poll_interval.max(MIN_POLL_INTERVAL)))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use proptest::prelude::*;

    use super::*;

    /// In-memory stream: reads drain `input` then report `WouldBlock`, or end
    /// of stream once `closed` is set.
    #[derive(Default)]
    struct FakeStream {
        input: VecDeque<u8>,
        output: Vec<u8>,
        closed: bool,
    }

    impl FakeStream {
        fn with_input(bytes: &[u8]) -> Self {
            Self { input: bytes.iter().copied().collect(), ..Self::default() }
        }
    }

    impl Read for FakeStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.input.is_empty() {
                return if self.closed {
                    Ok(0)
                } else {
                    Err(io::ErrorKind::WouldBlock.into())
                };
            }

            let n = buf.len().min(self.input.len());
            for (slot, byte) in buf.iter_mut().zip(self.input.drain(..n)) {
                *slot = byte;
            }
            Ok(n)
        }
    }

    impl Write for FakeStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn framed(message: &[u8]) -> Vec<u8> {
        let mut wire = Vec::new();
        write_frame(message, &mut wire).unwrap();
        wire
    }

    /// Window for receives expected to time out.
    const WINDOW: Duration = Duration::from_millis(5);

    /// Window for receives expected to produce a frame.
    const PATIENT: Duration = Duration::from_secs(2);

    #[test]
    fn frame_layout() {
        let wire = framed(b"hi");

        assert_eq!(&wire[..4], &[0xAA, 0x55, 0x00, 0x02]);
        assert_eq!(&wire[4..6], b"hi");
        assert_eq!(&wire[6..], &crc32fast::hash(&[0x00, 0x02, b'h', b'i']).to_be_bytes());
    }

    #[test]
    fn receives_back_to_back_frames() {
        let mut wire = framed(b"first");
        wire.extend(framed(b"second"));
        let mut transport = StreamTransport::new(FakeStream::with_input(&wire));

        assert_eq!(
            transport.receive(PATIENT).unwrap(),
            ReceiveOutcome::Frame(Bytes::from_static(b"first"))
        );
        assert_eq!(
            transport.receive(PATIENT).unwrap(),
            ReceiveOutcome::Frame(Bytes::from_static(b"second"))
        );
        assert_eq!(transport.receive(WINDOW).unwrap(), ReceiveOutcome::Timeout);
    }

    #[test]
    fn skips_line_noise_before_sync() {
        let mut wire = vec![0x00, 0xAA, 0x13, 0xFF, 0x55];
        wire.extend(framed(b"payload"));
        let mut transport = StreamTransport::new(FakeStream::with_input(&wire));

        assert_eq!(
            transport.receive(PATIENT).unwrap(),
            ReceiveOutcome::Frame(Bytes::from_static(b"payload"))
        );
    }

    #[test]
    fn partial_frame_times_out_then_completes() {
        let wire = framed(b"split");
        let (head, tail) = wire.split_at(5);
        let mut transport = StreamTransport::new(FakeStream::with_input(head));

        assert_eq!(transport.receive(WINDOW).unwrap(), ReceiveOutcome::Timeout);
        assert_eq!(transport.buffered(), 5);

        transport.stream.input.extend(tail.iter().copied());
        assert_eq!(
            transport.receive(PATIENT).unwrap(),
            ReceiveOutcome::Frame(Bytes::from_static(b"split"))
        );
    }

    #[test]
    fn checksum_mismatch_is_reported_then_resyncs() {
        let mut damaged = framed(b"noisy");
        damaged[5] ^= 0x01;
        let mut wire = damaged;
        wire.extend(framed(b"clean"));
        let mut transport = StreamTransport::new(FakeStream::with_input(&wire));

        let err = transport.receive(PATIENT).unwrap_err();
        assert!(matches!(err, TransportError::Checksum { .. }));
        assert!(!err.is_fatal());

        assert_eq!(
            transport.receive(PATIENT).unwrap(),
            ReceiveOutcome::Frame(Bytes::from_static(b"clean"))
        );
    }

    #[test]
    fn oversized_length_is_rejected() {
        let mut wire = vec![0xAA, 0x55, 0xFF, 0xFF];
        wire.extend(framed(b"after"));
        let mut transport = StreamTransport::new(FakeStream::with_input(&wire));

        assert_eq!(
            transport.receive(PATIENT),
            Err(TransportError::FrameTooLarge { size: 0xFFFF, max: MAX_FRAME_SIZE })
        );
        assert_eq!(
            transport.receive(PATIENT).unwrap(),
            ReceiveOutcome::Frame(Bytes::from_static(b"after"))
        );
    }

    #[test]
    fn end_of_stream_is_fatal() {
        let mut transport =
            StreamTransport::new(FakeStream { closed: true, ..FakeStream::default() });

        let err = transport.receive(WINDOW).unwrap_err();
        assert_eq!(err, TransportError::Disconnected);
        assert!(err.is_fatal());
    }

    #[test]
    fn send_frames_the_message() {
        let mut transport = StreamTransport::new(FakeStream::default());

        transport.send(b"response").unwrap();
        transport.send(b"again").unwrap();

        let mut expected = framed(b"response");
        expected.extend(framed(b"again"));
        assert_eq!(transport.stream.output, expected);
    }

    #[test]
    fn send_rejects_oversized_message() {
        let mut transport = StreamTransport::new(FakeStream::default());

        let err = transport.send(&[0u8; MAX_FRAME_SIZE + 1]).unwrap_err();
        assert!(matches!(err, TransportError::FrameTooLarge { .. }));
        assert!(transport.stream.output.is_empty());
    }

    #[test]
    fn prop_frames_survive_leading_noise() {
        proptest!(|(
            noise in prop::collection::vec(
                any::<u8>().prop_filter("no sync byte", |b| *b != SYNC[0]),
                0..32,
            ),
            message in prop::collection::vec(any::<u8>(), 0..MAX_FRAME_SIZE),
        )| {
            let mut wire = noise;
            wire.extend(framed(&message));
            let mut transport = StreamTransport::new(FakeStream::with_input(&wire));

            prop_assert_eq!(
                transport.receive(PATIENT).unwrap(),
                ReceiveOutcome::Frame(Bytes::from(message))
            );
        });
    }

    #[test]
    fn prop_arbitrary_bytes_never_panic() {
        proptest!(|(wire in prop::collection::vec(any::<u8>(), 0..1024))| {
            let mut transport = StreamTransport::new(FakeStream::with_input(&wire));

            for _ in 0..8 {
                let _ = transport.receive(Duration::ZERO);
            }
            prop_assert!(transport.buffered() <= wire.len());
        });
    }
}
