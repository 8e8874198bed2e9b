//! Error response payload.

use serde::{Deserialize, Serialize};

/// Explicit error answer to a request the host could not serve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code identifying the failure.
    pub code: u16,
    /// Raw kind of the request being answered.
    pub request_kind: u16,
    /// Human-readable detail.
    pub message: String,
}

impl ErrorResponse {
    /// Request kind not supported by this host.
    pub const UNKNOWN_REQUEST_KIND: u16 = 0x0001;
    /// Commanded setpoints failed validation.
    pub const INVALID_COMMAND: u16 = 0x0002;

    /// Create an unknown request kind error.
    pub fn unknown_request_kind(kind: u16) -> Self {
        Self {
            code: Self::UNKNOWN_REQUEST_KIND,
            request_kind: kind,
            message: format!("unsupported request kind {kind:#06x}"),
        }
    }

    /// Create an invalid command error.
    pub fn invalid_command(kind: u16, reason: impl Into<String>) -> Self {
        Self { code: Self::INVALID_COMMAND, request_kind: kind, message: reason.into() }
    }
}
