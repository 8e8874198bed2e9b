//! Host error types.

use std::fmt;

use powertrain_core::ExchangeError;

/// Errors that can occur in the host.
#[derive(Debug)]
pub enum HostError {
    /// Configuration error (zero timeout, unparseable address, etc.).
    ///
    /// Fatal at startup. Fix configuration and restart.
    Config(String),

    /// Could not reach the serial bridge.
    ///
    /// Transient: the host retries after the reconnect delay.
    Connect(String),

    /// Exchange loop stopped on a fatal link error.
    ///
    /// The fail-safe has already engaged. The host reconnects.
    Link(ExchangeError),

    /// Internal error (panicked task, logic bug).
    ///
    /// Should never happen in correct implementation. Indicates a bug.
    Internal(String),
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Connect(msg) => write!(f, "connect error: {msg}"),
            Self::Link(err) => write!(f, "link error: {err}"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for HostError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Link(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ExchangeError> for HostError {
    fn from(err: ExchangeError) -> Self {
        Self::Link(err)
    }
}
