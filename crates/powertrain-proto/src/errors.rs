//! Protocol error types.

use thiserror::Error;

/// Result alias for wire-format operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while parsing or producing a wire message.
///
/// Every variant describes bytes that do not form a valid message (or a
/// message that cannot be represented on the wire). None of them are
/// retryable: the same bytes always produce the same error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer is shorter than the fixed header
    #[error("message too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Minimum size required
        expected: usize,
        /// Bytes available
        actual: usize,
    },

    /// Header magic does not identify this protocol
    #[error("invalid magic: {0:#06x}")]
    InvalidMagic(u16),

    /// Header version is not one this build understands
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    /// Payload exceeds what fits in one frame
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Payload size in bytes
        size: usize,
        /// Maximum allowed payload size
        max: usize,
    },

    /// Header claims a different payload size than the frame carries
    #[error("payload size mismatch: header declares {declared} bytes, frame carries {actual}")]
    LengthMismatch {
        /// Size declared in the header
        declared: usize,
        /// Bytes present after the header
        actual: usize,
    },

    /// Header carries a kind the receiving side never accepts
    #[error("unexpected message kind: {0:#06x}")]
    UnexpectedKind(u16),

    /// Payload bytes are not valid CBOR for the declared kind
    #[error("CBOR decode error: {0}")]
    CborDecode(String),

    /// Payload holds bytes after its CBOR item
    #[error("trailing payload: {extra} bytes after the CBOR item")]
    TrailingPayload {
        /// Bytes left over
        extra: usize,
    },

    /// Payload could not be serialized
    #[error("CBOR encode error: {0}")]
    CborEncode(String),
}

/// A commanded value outside what the controller accepts.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CommandError {
    /// NaN or infinite setpoint
    #[error("{field} is not finite")]
    NotFinite {
        /// Offending field
        field: &'static str,
    },

    /// Setpoint outside its normalized range
    #[error("{field} out of range: {value} (expected {min}..={max})")]
    OutOfRange {
        /// Offending field
        field: &'static str,
        /// Value received
        value: f32,
        /// Inclusive lower bound
        min: f32,
        /// Inclusive upper bound
        max: f32,
    },
}
