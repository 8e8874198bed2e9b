//! Powertrain production host.
//!
//! Production glue around [`powertrain_core`]'s exchange loop: a framed,
//! checksummed byte-stream link to the ESC, motor storage shared with the
//! control tick, and a Tokio runtime that reconnects after link loss.
//!
//! # Components
//!
//! - [`Host`]: reconnecting runtime driving one exchange session at a time
//! - [`StreamTransport`]: sync-word and CRC framing over any byte stream
//! - [`SharedMotor`] / [`MotorProcessor`]: command and state storage
//! - [`BenchPlant`]: first-order motor model for bench runs

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod host;
mod motor;
mod plant;
mod transport;

pub use error::HostError;
pub use host::{Host, HostConfig};
pub use motor::{MotorProcessor, SharedMotor};
pub use plant::{BenchPlant, PlantParams};
pub use transport::{
    MAX_WIRE_SIZE, SYNC, StreamTransport, configure_stream, connect_tcp, write_frame,
};
