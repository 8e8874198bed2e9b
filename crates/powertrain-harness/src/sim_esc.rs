//! Simulated ESC peer: builds request frames and reads responses.

use bytes::Bytes;
use powertrain_proto::{
    EscRequest, EscResponse, ExchangeStateRequest, MAX_FRAME_SIZE, MessageHeader,
    MessageKind, MotorCommand, ProtocolError,
};

/// ESC side of the link.
///
/// Numbers requests with an increasing sequence, the way the real
/// controller does, and provides the damaged frames a noisy link produces.
#[derive(Debug, Clone, Default)]
pub struct SimEsc {
    next_sequence: u32,
}

impl SimEsc {
    /// Peer starting at sequence 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence number the next request will carry.
    pub fn next_sequence(&self) -> u32 {
        self.next_sequence
    }

    /// Encode the next state-exchange request.
    pub fn exchange_state(
        &mut self,
        command: Option<MotorCommand>,
    ) -> Result<Bytes, ProtocolError> {
        let sequence = self.next_sequence;
        let request = EscRequest::ExchangeState(ExchangeStateRequest { sequence, command });
        self.next_sequence = self.next_sequence.wrapping_add(1);

        let mut frame = Vec::with_capacity(MAX_FRAME_SIZE);
        request.encode(&mut frame)?;
        Ok(Bytes::from(frame))
    }

    /// Well-formed frame of an arbitrary kind with an opaque payload.
    pub fn raw_kind(kind: u16, payload: &[u8]) -> Result<Bytes, ProtocolError> {
        let size = u16::try_from(payload.len())
            .ok()
            .filter(|size| *size <= MessageHeader::MAX_PAYLOAD_SIZE)
            .ok_or(ProtocolError::PayloadTooLarge {
                size: payload.len(),
                max: MessageHeader::MAX_PAYLOAD_SIZE as usize,
            })?;

        let mut header = MessageHeader::with_raw_kind(kind);
        header.set_payload_size(size);

        let mut frame = Vec::with_capacity(MessageHeader::SIZE + payload.len());
        frame.extend_from_slice(&header.to_bytes());
        frame.extend_from_slice(payload);
        Ok(Bytes::from(frame))
    }

    /// State-exchange header followed by bytes that are not valid CBOR for
    /// the request.
    pub fn undecodable_exchange_state() -> Bytes {
        let payload = [0xFF, 0xFF, 0xFF];
        let mut header = MessageHeader::new(MessageKind::ExchangeState);
        header.set_payload_size(payload.len() as u16);

        let mut frame = header.to_bytes().to_vec();
        frame.extend_from_slice(&payload);
        Bytes::from(frame)
    }

    /// Frame cut short after `len` bytes.
    pub fn truncated(frame: &Bytes, len: usize) -> Bytes {
        frame.slice(..len.min(frame.len()))
    }

    /// Frame with its magic number damaged.
    pub fn bad_magic(frame: &Bytes) -> Bytes {
        let mut damaged = frame.to_vec();
        if let Some(first) = damaged.first_mut() {
            *first ^= 0xFF;
        }
        Bytes::from(damaged)
    }

    /// Frame with `extra` appended to its payload and the declared size
    /// grown to match, so only the payload itself is invalid.
    pub fn padded(frame: &Bytes, extra: &[u8]) -> Result<Bytes, ProtocolError> {
        let mut header = *MessageHeader::from_bytes(frame)?;
        let size = usize::from(header.payload_size()) + extra.len();
        let size = u16::try_from(size)
            .ok()
            .filter(|size| *size <= MessageHeader::MAX_PAYLOAD_SIZE)
            .ok_or(ProtocolError::PayloadTooLarge {
                size,
                max: MessageHeader::MAX_PAYLOAD_SIZE as usize,
            })?;
        header.set_payload_size(size);

        let mut padded = header.to_bytes().to_vec();
        padded.extend_from_slice(frame.get(MessageHeader::SIZE..).unwrap_or_default());
        padded.extend_from_slice(extra);
        Ok(Bytes::from(padded))
    }

    /// Decode a frame sent back by the host.
    pub fn read_response(frame: &[u8]) -> Result<EscResponse, ProtocolError> {
        EscResponse::decode(frame)
    }
}
