//! Host-side core of the powertrain exchange protocol.
//!
//! The host answers a perpetual stream of requests from the motor controller
//! (ESC): receive a frame, decode it, dispatch by kind, let the processor
//! apply commands and read motor state, encode the response, send it back.
//!
//! # Architecture
//!
//! [`ExchangeLoop`] owns the cycle and nothing else. Everything that touches
//! the outside world sits behind a trait so the loop can be driven
//! deterministically in tests:
//!
//! - [`FrameTransport`]: delivers and accepts whole frames (serial link,
//!   simulation, chaos wrapper)
//! - [`MessageCodec`]: bytes to [`EscRequest`](powertrain_proto::EscRequest)
//!   and [`EscResponse`](powertrain_proto::EscResponse) to bytes
//! - [`ExchangeProcessor`]: applies commanded setpoints and reads measured
//!   state from motor storage shared with the control tick
//!
//! [`LinkMonitor`] decides when link failure is sustained enough to force
//! the motors into the safe state, and when the link is healthy enough to
//! hand control back.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod codec;
pub mod error;
pub mod exchange;
pub mod fail_safe;
pub mod processor;
pub mod transport;

pub use codec::{CborCodec, MessageCodec};
pub use error::ExchangeError;
pub use exchange::{
    CyclePhase, ExchangeConfig, ExchangeLoop, ExchangeStats, UnknownKindPolicy,
};
pub use fail_safe::LinkMonitor;
pub use processor::ExchangeProcessor;
pub use transport::{FrameTransport, ReceiveOutcome, TransportError};
