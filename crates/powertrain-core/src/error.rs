//! Error taxonomy of one exchange cycle.
//!
//! Every variant aborts the current cycle and returns the loop to Idle. Only
//! a fatal transport error stops [`ExchangeLoop::run`](crate::ExchangeLoop::run).

use std::time::Duration;

use powertrain_proto::ProtocolError;
use thiserror::Error;

use crate::transport::TransportError;

/// Why a cycle ended without sending a response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    /// No request arrived within the receive window
    ///
    /// Expected whenever the ESC is quiet. Never mutates motor state.
    #[error("no request within {timeout:?}")]
    ReceiveTimeout {
        /// Receive window that elapsed
        timeout: Duration,
    },

    /// Link-level failure on receive or send
    #[error("transport error: {0}")]
    Transport(TransportError),

    /// Frame bytes do not form a valid request; the frame is discarded
    #[error("malformed frame: {0}")]
    MalformedFrame(ProtocolError),

    /// Well-formed request of a kind this host does not serve, ignored by
    /// policy
    #[error("unknown request kind {kind:#06x}")]
    UnknownRequestKind {
        /// Raw kind from the header
        kind: u16,
    },

    /// Response could not be encoded
    ///
    /// Indicates a bug: responses are built from validated inputs.
    #[error("failed to encode response: {0}")]
    Encode(ProtocolError),
}

impl ExchangeError {
    /// Returns true if the link is gone and the loop must stop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_fatal())
    }

    /// Returns true for outcomes that are part of normal operation.
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::ReceiveTimeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_link_loss_is_fatal() {
        assert!(ExchangeError::Transport(TransportError::Disconnected).is_fatal());

        assert!(!ExchangeError::Transport(TransportError::Io("noise".into())).is_fatal());
        assert!(!ExchangeError::ReceiveTimeout { timeout: Duration::from_millis(50) }.is_fatal());
        assert!(!ExchangeError::MalformedFrame(ProtocolError::InvalidMagic(0)).is_fatal());
        assert!(!ExchangeError::UnknownRequestKind { kind: 9 }.is_fatal());
        assert!(!ExchangeError::Encode(ProtocolError::CborEncode("x".into())).is_fatal());
    }

    #[test]
    fn timeouts_are_expected() {
        assert!(ExchangeError::ReceiveTimeout { timeout: Duration::from_millis(50) }.is_expected());
        assert!(!ExchangeError::Transport(TransportError::Disconnected).is_expected());
    }
}
