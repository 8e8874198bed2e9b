//! Message kind discriminants.
//!
//! The kind travels in the [`MessageHeader`](crate::MessageHeader), so a
//! receiver can tell what a message is without touching the payload. Raw
//! values outside this enum are still representable as `u16`; the decoder
//! turns them into [`EscRequest::Unknown`](crate::EscRequest::Unknown) instead
//! of failing.

/// Kinds of message carried on the link.
///
/// Request and response of one exchange share a kind. `Error` only ever
/// appears on responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum MessageKind {
    /// Commanded setpoints in, measured state out
    ExchangeState = 0x0001,
    /// Explicit error response
    Error = 0x00FF,
}

impl MessageKind {
    /// Parse a raw kind. `None` if unrecognized.
    #[must_use]
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0001 => Some(Self::ExchangeState),
            0x00FF => Some(Self::Error),
            _ => None,
        }
    }

    /// Raw wire value.
    #[must_use]
    pub const fn to_u16(self) -> u16 {
        self as u16
    }

    /// Whether a peer may send this kind as a request.
    #[must_use]
    pub const fn is_request(self) -> bool {
        match self {
            Self::ExchangeState => true,
            Self::Error => false,
        }
    }

    /// Short name for logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ExchangeState => "exchange_state",
            Self::Error => "error",
        }
    }
}
