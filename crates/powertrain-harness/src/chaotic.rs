//! Chaotic transport wrapper for fault injection testing
//!
//! Wraps any [`FrameTransport`] and randomly damages the link: failed
//! receives and sends, dropped frames, flipped bits. Every fault is drawn
//! from a seeded RNG so a failing run replays exactly.

use std::time::Duration;

use bytes::Bytes;
use powertrain_core::{FrameTransport, ReceiveOutcome, TransportError};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::trace;

/// Fault probabilities, each in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChaosConfig {
    /// Receive fails with a link error
    pub receive_error_rate: f64,
    /// Frame is lost in transit and the receive window elapses
    pub drop_rate: f64,
    /// One bit of the delivered frame is flipped
    pub corrupt_rate: f64,
    /// Send fails with a link error
    pub send_error_rate: f64,
}

impl ChaosConfig {
    /// Same rate for every fault.
    pub fn uniform(rate: f64) -> Self {
        Self {
            receive_error_rate: rate,
            drop_rate: rate,
            corrupt_rate: rate,
            send_error_rate: rate,
        }
    }

    fn clamped(self) -> Self {
        let clamp = |rate: f64| if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) };
        Self {
            receive_error_rate: clamp(self.receive_error_rate),
            drop_rate: clamp(self.drop_rate),
            corrupt_rate: clamp(self.corrupt_rate),
            send_error_rate: clamp(self.send_error_rate),
        }
    }
}

/// Faults injected so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChaosStats {
    /// Receives failed with a link error
    pub receive_errors: u64,
    /// Frames dropped
    pub dropped: u64,
    /// Frames delivered with a flipped bit
    pub corrupted: u64,
    /// Sends failed with a link error
    pub send_errors: u64,
}

/// Transport wrapper that randomly injects link faults.
#[derive(Debug)]
pub struct ChaoticTransport<T> {
    inner: T,
    config: ChaosConfig,
    rng: ChaCha8Rng,
    stats: ChaosStats,
}

impl<T: FrameTransport> ChaoticTransport<T> {
    /// Wrap `inner`. Rates outside `0.0..=1.0` are clamped.
    pub fn with_seed(inner: T, config: ChaosConfig, seed: u64) -> Self {
        Self {
            inner,
            config: config.clamped(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            stats: ChaosStats::default(),
        }
    }

    /// Wrapped transport.
    pub fn inner(&self) -> &T {
        &self.inner
    }

    /// Faults injected so far.
    pub fn stats(&self) -> ChaosStats {
        self.stats
    }

    fn corrupt(&mut self, frame: &Bytes) -> Bytes {
        let mut damaged = frame.to_vec();
        if !damaged.is_empty() {
            let index = self.rng.gen_range(0..damaged.len());
            let bit = self.rng.gen_range(0..8u32);
            damaged[index] ^= 1 << bit;
        }
        Bytes::from(damaged)
    }
}

impl<T: FrameTransport> FrameTransport for ChaoticTransport<T> {
    fn receive(&mut self, timeout: Duration) -> Result<ReceiveOutcome, TransportError> {
        if self.rng.gen_bool(self.config.receive_error_rate) {
            self.stats.receive_errors += 1;
            trace!("injecting receive error");
            return Err(TransportError::Io("chaotic failure injection".to_string()));
        }

        match self.inner.receive(timeout)? {
            ReceiveOutcome::Frame(_) if self.rng.gen_bool(self.config.drop_rate) => {
                self.stats.dropped += 1;
                trace!("dropping frame");
                Ok(ReceiveOutcome::Timeout)
            },
            ReceiveOutcome::Frame(frame) if self.rng.gen_bool(self.config.corrupt_rate) => {
                self.stats.corrupted += 1;
                trace!(len = frame.len(), "corrupting frame");
                Ok(ReceiveOutcome::Frame(self.corrupt(&frame)))
            },
            outcome => Ok(outcome),
        }
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        if self.rng.gen_bool(self.config.send_error_rate) {
            self.stats.send_errors += 1;
            trace!("injecting send error");
            return Err(TransportError::Io("chaotic failure injection".to_string()));
        }

        self.inner.send(frame)
    }
}
