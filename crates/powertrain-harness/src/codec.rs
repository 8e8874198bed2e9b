//! Codec wrapper that fails encodes on demand.

use std::cell::Cell;

use powertrain_core::{CborCodec, MessageCodec};
use powertrain_proto::{EscRequest, EscResponse, ProtocolError};
use tracing::trace;

/// [`CborCodec`] whose next `n` encodes fail.
///
/// Decoding is never affected.
#[derive(Debug, Clone, Default)]
pub struct FaultyCodec {
    inner: CborCodec,
    pending_failures: Cell<usize>,
    injected: Cell<usize>,
}

impl FaultyCodec {
    /// Codec failing the first `count` encodes.
    pub fn failing_encodes(count: usize) -> Self {
        Self { pending_failures: Cell::new(count), ..Self::default() }
    }

    /// Encode failures injected so far.
    pub fn injected(&self) -> usize {
        self.injected.get()
    }
}

impl MessageCodec for FaultyCodec {
    fn decode(&self, frame: &[u8]) -> Result<EscRequest, ProtocolError> {
        self.inner.decode(frame)
    }

    fn encode(&self, response: &EscResponse, dst: &mut Vec<u8>) -> Result<(), ProtocolError> {
        let pending = self.pending_failures.get();
        if pending > 0 {
            self.pending_failures.set(pending - 1);
            self.injected.set(self.injected.get() + 1);
            trace!(kind = response.kind().name(), "injecting encode failure");
            return Err(ProtocolError::CborEncode("injected encode failure".to_string()));
        }

        self.inner.encode(response, dst)
    }
}

#[cfg(test)]
mod tests {
    use powertrain_proto::{ErrorResponse, MessageKind};

    use super::*;

    #[test]
    fn fails_then_recovers() {
        let codec = FaultyCodec::failing_encodes(1);
        let response = EscResponse::Error(ErrorResponse::unknown_request_kind(9));
        let mut dst = Vec::new();

        assert!(matches!(codec.encode(&response, &mut dst), Err(ProtocolError::CborEncode(_))));
        assert!(dst.is_empty());

        codec.encode(&response, &mut dst).unwrap();
        assert_eq!(EscResponse::decode(&dst).unwrap().kind(), MessageKind::Error);
        assert_eq!(codec.injected(), 1);
    }
}
