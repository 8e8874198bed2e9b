//! Frame transport seam.
//!
//! The transport owns everything below the message: sync words, length
//! prefixes, checksums, escaping. The exchange loop only ever sees complete
//! frames as opaque bytes.

use std::{io, time::Duration};

use bytes::Bytes;
use thiserror::Error;

/// Link-level failures.
///
/// Kept as strings rather than `io::Error` so the type stays `Clone + Eq` for
/// scripted transports and assertions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Underlying device or socket reported an error
    #[error("I/O error: {0}")]
    Io(String),

    /// Peer or device is gone; no further frames can arrive
    #[error("link closed")]
    Disconnected,

    /// Frame announced a length the receive buffer cannot hold
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Announced frame size
        size: usize,
        /// Receive buffer capacity
        max: usize,
    },

    /// Frame arrived but its checksum does not match
    #[error("checksum mismatch: frame carries {expected:#010x}, computed {actual:#010x}")]
    Checksum {
        /// Checksum carried by the frame
        expected: u32,
        /// Checksum computed over the received bytes
        actual: u32,
    },
}

impl TransportError {
    /// Returns true if the link cannot recover without being reopened.
    ///
    /// Everything else (noise, a corrupted frame, a transient device error)
    /// may clear up on the next receive.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Disconnected)
    }
}

/// Convert `io::Error` at the device boundary.
impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected => Self::Disconnected,
            _ => Self::Io(err.to_string()),
        }
    }
}

/// Result of one bounded receive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveOutcome {
    /// One complete frame
    Frame(Bytes),
    /// Nothing arrived before the deadline
    Timeout,
}

/// Delivers and accepts complete frames.
///
/// `receive` is the only call in the exchange cycle allowed to block, and it
/// must return within roughly `timeout`.
pub trait FrameTransport {
    /// Wait up to `timeout` for the next complete frame.
    fn receive(&mut self, timeout: Duration) -> Result<ReceiveOutcome, TransportError>;

    /// Transmit one complete frame.
    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError>;
}

impl<T: FrameTransport + ?Sized> FrameTransport for &mut T {
    fn receive(&mut self, timeout: Duration) -> Result<ReceiveOutcome, TransportError> {
        (**self).receive(timeout)
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        (**self).send(frame)
    }
}
