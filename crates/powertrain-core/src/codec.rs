//! Message codec seam.

use powertrain_proto::{EscRequest, EscResponse, ProtocolError};

/// Turns frames into typed requests and typed responses into frames.
///
/// The wire schema is versioned outside this crate; the loop depends only on
/// the tagged-union shape of [`EscRequest`] and [`EscResponse`].
pub trait MessageCodec {
    /// Decode one complete frame.
    ///
    /// Unrecognized kinds must come back as [`EscRequest::Unknown`], not as
    /// an error.
    fn decode(&self, frame: &[u8]) -> Result<EscRequest, ProtocolError>;

    /// Append the encoded response to `dst`.
    fn encode(&self, response: &EscResponse, dst: &mut Vec<u8>) -> Result<(), ProtocolError>;
}

/// Header + CBOR codec from [`powertrain_proto`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CborCodec;

impl MessageCodec for CborCodec {
    fn decode(&self, frame: &[u8]) -> Result<EscRequest, ProtocolError> {
        EscRequest::decode(frame)
    }

    fn encode(&self, response: &EscResponse, dst: &mut Vec<u8>) -> Result<(), ProtocolError> {
        response.encode(dst)
    }
}
