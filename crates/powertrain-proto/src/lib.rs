//! # Powertrain Protocol: Wire Format
//!
//! Message types exchanged between the vehicle host and the motor controller
//! (ESC) over the point-to-point serial link.
//!
//! ## Layout
//!
//! Every message is a fixed 8-byte [`MessageHeader`] (raw binary, Big Endian)
//! followed by a CBOR-encoded payload:
//!
//! - **Header**: magic, version, [`MessageKind`] and payload size. Parsed
//!   zero-copy with [`zerocopy`](https://docs.rs/zerocopy); every bit pattern
//!   is a valid header, so parsing untrusted bytes cannot misbehave.
//! - **Payload**: CBOR, so fields can be added without breaking older peers.
//!   The kind lives in the header only; the payload carries no variant tag.
//!
//! Byte-level link framing (sync word, length prefix, checksum) is NOT part of
//! this crate. A message is what one link frame carries.
//!
//! ## Size Limits
//!
//! A complete message never exceeds [`MAX_FRAME_SIZE`] bytes, the receive
//! buffer capacity of the serial transport on both ends of the link.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod errors;
pub mod header;
pub mod kind;
pub mod message;
pub mod payloads;

pub use errors::{CommandError, ProtocolError, Result};
pub use header::MessageHeader;
pub use kind::MessageKind;
pub use message::{EscRequest, EscResponse};
pub use payloads::{
    Direction, ErrorResponse, ExchangeStateRequest, ExchangeStateResponse, MeasuredState,
    MotorCommand,
};

/// Largest complete message (header + payload) either side will accept.
pub const MAX_FRAME_SIZE: usize = 512;
