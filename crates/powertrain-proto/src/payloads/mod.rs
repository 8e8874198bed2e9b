//! CBOR-encoded message payloads.
//!
//! One module per exchange. Payload structs serialize their fields only; the
//! message kind is carried by the header.

pub mod error;
pub mod exchange_state;

pub use error::ErrorResponse;
pub use exchange_state::{
    Direction, ExchangeStateRequest, ExchangeStateResponse, MeasuredState, MotorCommand,
};
