//! Transport that replays a fixed script.

use std::{collections::VecDeque, time::Duration};

use bytes::Bytes;
use powertrain_core::{FrameTransport, ReceiveOutcome, TransportError};

/// One scripted receive outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    /// Deliver this frame
    Frame(Bytes),
    /// Let the receive window elapse
    Timeout,
    /// Fail the receive
    Error(TransportError),
}

/// Replays receive outcomes in order and records every frame sent.
///
/// Once the script runs out, every receive reports
/// [`TransportError::Disconnected`], which stops `ExchangeLoop::run`.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    script: VecDeque<ScriptStep>,
    send_failures: VecDeque<TransportError>,
    sent: Vec<Bytes>,
    receive_calls: usize,
    last_timeout: Option<Duration>,
}

impl ScriptedTransport {
    /// Transport replaying `steps`.
    pub fn new(steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        Self { script: steps.into_iter().collect(), ..Self::default() }
    }

    /// Transport delivering `frames` back to back.
    pub fn with_frames(frames: impl IntoIterator<Item = Bytes>) -> Self {
        Self::new(frames.into_iter().map(ScriptStep::Frame))
    }

    /// Append a step to the script.
    pub fn push(&mut self, step: ScriptStep) {
        self.script.push_back(step);
    }

    /// Fail the next send (after any already queued send failures).
    pub fn fail_next_send(&mut self, err: TransportError) {
        self.send_failures.push_back(err);
    }

    /// Frames sent successfully, in order.
    pub fn sent(&self) -> &[Bytes] {
        &self.sent
    }

    /// Number of receive calls made.
    pub fn receive_calls(&self) -> usize {
        self.receive_calls
    }

    /// Timeout passed to the most recent receive.
    pub fn last_timeout(&self) -> Option<Duration> {
        self.last_timeout
    }

    /// Steps not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl FrameTransport for ScriptedTransport {
    fn receive(&mut self, timeout: Duration) -> Result<ReceiveOutcome, TransportError> {
        self.receive_calls += 1;
        self.last_timeout = Some(timeout);

        match self.script.pop_front() {
            Some(ScriptStep::Frame(frame)) => Ok(ReceiveOutcome::Frame(frame)),
            Some(ScriptStep::Timeout) => Ok(ReceiveOutcome::Timeout),
            Some(ScriptStep::Error(err)) => Err(err),
            None => Err(TransportError::Disconnected),
        }
    }

    fn send(&mut self, frame: &[u8]) -> Result<(), TransportError> {
        if let Some(err) = self.send_failures.pop_front() {
            return Err(err);
        }

        self.sent.push(Bytes::copy_from_slice(frame));
        Ok(())
    }
}
