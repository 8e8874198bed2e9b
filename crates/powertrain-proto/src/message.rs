//! Typed request and response messages.
//!
//! [`EscRequest`] and [`EscResponse`] are the tagged unions the exchange loop
//! works with. Each variant maps to exactly one [`MessageKind`] (enforced by
//! match exhaustiveness): adding a variant fails to build until `kind()`,
//! `encode()` and `decode()` handle it.
//!
//! # Invariants
//!
//! - Exact framing: a message is `header + payload` with nothing after it. The
//!   header's `payload_size` must equal the bytes that follow, and the
//!   payload must be exactly one CBOR item.
//! - Round-trip: encoding a decoded message reproduces the original bytes.
//!   CBOR of these payload structs is deterministic (fixed field order,
//!   shortest float encoding).

use serde::{Serialize, de::DeserializeOwned};

use crate::{
    MessageHeader, MessageKind,
    errors::{ProtocolError, Result},
    payloads::{ErrorResponse, ExchangeStateRequest, ExchangeStateResponse},
};

/// Request sent by the ESC.
#[derive(Debug, Clone, PartialEq)]
pub enum EscRequest {
    /// Exchange commanded setpoints for measured state
    ExchangeState(ExchangeStateRequest),
    /// Well-formed message whose kind this host does not serve
    ///
    /// Produced when the peer speaks a newer schema. The payload is not
    /// parsed.
    Unknown {
        /// Raw kind from the header
        kind: u16,
    },
}

impl EscRequest {
    /// Raw kind of this request.
    #[must_use]
    pub const fn raw_kind(&self) -> u16 {
        match self {
            Self::ExchangeState(_) => MessageKind::ExchangeState.to_u16(),
            Self::Unknown { kind } => *kind,
        }
    }

    /// Decode a complete message.
    ///
    /// # Errors
    ///
    /// - Header errors from [`MessageHeader::from_bytes`]
    /// - `ProtocolError::LengthMismatch` if the frame is truncated or carries
    ///   trailing bytes
    /// - `ProtocolError::CborDecode` if a known kind's payload is invalid
    /// - `ProtocolError::TrailingPayload` if bytes follow the CBOR item
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (header, payload) = split_message(bytes)?;

        match header.kind_enum() {
            Some(MessageKind::ExchangeState) => Ok(Self::ExchangeState(decode_payload(payload)?)),
            Some(kind @ MessageKind::Error) => Ok(Self::Unknown { kind: kind.to_u16() }),
            None => Ok(Self::Unknown { kind: header.kind() }),
        }
    }

    /// Append the encoded message to `dst`.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::CborEncode` if serialization fails
    /// - `ProtocolError::PayloadTooLarge` if the message exceeds one frame
    pub fn encode(&self, dst: &mut Vec<u8>) -> Result<()> {
        match self {
            Self::ExchangeState(inner) => encode_message(self.raw_kind(), Some(inner), dst),
            Self::Unknown { kind } => encode_message::<()>(*kind, None, dst),
        }
    }
}

/// Response sent by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum EscResponse {
    /// Answer to [`EscRequest::ExchangeState`]
    ExchangeState(ExchangeStateResponse),
    /// Explicit error answer
    Error(ErrorResponse),
}

impl EscResponse {
    /// Kind corresponding to this response.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::ExchangeState(_) => MessageKind::ExchangeState,
            Self::Error(_) => MessageKind::Error,
        }
    }

    /// Append the encoded message to `dst`.
    ///
    /// On error `dst` is left as it was.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::CborEncode` if serialization fails
    /// - `ProtocolError::PayloadTooLarge` if the message exceeds one frame
    pub fn encode(&self, dst: &mut Vec<u8>) -> Result<()> {
        let kind = self.kind().to_u16();
        match self {
            Self::ExchangeState(inner) => encode_message(kind, Some(inner), dst),
            Self::Error(inner) => encode_message(kind, Some(inner), dst),
        }
    }

    /// Decode a complete message (ESC side).
    ///
    /// # Errors
    ///
    /// - Header errors from [`MessageHeader::from_bytes`]
    /// - `ProtocolError::LengthMismatch` on truncated or padded frames
    /// - `ProtocolError::UnexpectedKind` for kinds that are not responses
    /// - `ProtocolError::CborDecode` if the payload is invalid
    /// - `ProtocolError::TrailingPayload` if bytes follow the CBOR item
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (header, payload) = split_message(bytes)?;

        match header.kind_enum() {
            Some(MessageKind::ExchangeState) => Ok(Self::ExchangeState(decode_payload(payload)?)),
            Some(MessageKind::Error) => Ok(Self::Error(decode_payload(payload)?)),
            None => Err(ProtocolError::UnexpectedKind(header.kind())),
        }
    }
}

/// Validate the header and split off the payload.
fn split_message(bytes: &[u8]) -> Result<(&MessageHeader, &[u8])> {
    let header = MessageHeader::from_bytes(bytes)?;
    let payload = bytes.get(MessageHeader::SIZE..).unwrap_or_default();

    let declared = header.payload_size() as usize;
    if payload.len() != declared {
        return Err(ProtocolError::LengthMismatch { declared, actual: payload.len() });
    }

    Ok((header, payload))
}

/// Decode exactly one CBOR item spanning the whole payload.
fn decode_payload<T: DeserializeOwned>(payload: &[u8]) -> Result<T> {
    let mut rest = payload;
    let value = ciborium::de::from_reader(&mut rest)
        .map_err(|e| ProtocolError::CborDecode(e.to_string()))?;

    if !rest.is_empty() {
        return Err(ProtocolError::TrailingPayload { extra: rest.len() });
    }
    Ok(value)
}

/// Append `header + payload`, patching the payload size once it is known.
fn encode_message<T: Serialize>(kind: u16, payload: Option<&T>, dst: &mut Vec<u8>) -> Result<()> {
    let start = dst.len();
    dst.extend_from_slice(&[0u8; MessageHeader::SIZE]);

    if let Some(payload) = payload {
        if let Err(e) = ciborium::ser::into_writer(payload, &mut *dst) {
            dst.truncate(start);
            return Err(ProtocolError::CborEncode(e.to_string()));
        }
    }

    let payload_len = dst.len() - start - MessageHeader::SIZE;
    let Ok(payload_size) = u16::try_from(payload_len) else {
        dst.truncate(start);
        return Err(too_large(payload_len));
    };
    if payload_size > MessageHeader::MAX_PAYLOAD_SIZE {
        dst.truncate(start);
        return Err(too_large(payload_len));
    }

    let mut header = MessageHeader::with_raw_kind(kind);
    header.set_payload_size(payload_size);
    dst[start..start + MessageHeader::SIZE].copy_from_slice(&header.to_bytes());

    debug_assert_eq!(dst.len() - start, MessageHeader::SIZE + payload_len);
    Ok(())
}

fn too_large(size: usize) -> ProtocolError {
    ProtocolError::PayloadTooLarge { size, max: MessageHeader::MAX_PAYLOAD_SIZE as usize }
}
