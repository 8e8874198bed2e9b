//! Deterministic test doubles for the powertrain exchange loop.
//!
//! Everything here is single-threaded and reproducible: scripted transports
//! replay a fixed sequence of receive outcomes, the chaotic transport draws
//! its faults from a seeded RNG, the faulty codec fails encodes on demand,
//! and the recording processor keeps every call it sees so tests can assert
//! on what reached the motors.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod chaotic;
pub mod codec;
pub mod recording;
pub mod scripted;
pub mod sim_esc;

pub use chaotic::{ChaosConfig, ChaosStats, ChaoticTransport};
pub use codec::FaultyCodec;
pub use recording::RecordingProcessor;
pub use scripted::{ScriptStep, ScriptedTransport};
pub use sim_esc::SimEsc;
