//! The request/response exchange loop.
//!
//! # Cycle
//!
//! ```text
//! Idle → Receiving → Decoding → Dispatching → Processing → Encoding → Sending → Idle
//!            │           │            │                         │          │
//!            └───────────┴────────────┴─── error: abort ────────┴──────────┘──▶ Idle
//! ```
//!
//! A cycle produces at most one response, and only for a request that
//! decoded cleanly. Nothing about a cycle survives into the next one: the
//! cycle buffers are cleared before every receive.
//!
//! Timeouts are silent. A malformed frame is discarded without a response
//! and without touching the motors. Consecutive link errors feed the
//! [`LinkMonitor`]; when it trips, the processor is told to enter the safe
//! state exactly once.

mod dispatch;

use std::{convert::Infallible, time::Duration};

use powertrain_proto::{EscResponse, MAX_FRAME_SIZE, MessageKind};
use tracing::{error, trace, warn};

use crate::{
    codec::MessageCodec,
    error::ExchangeError,
    fail_safe::LinkMonitor,
    processor::ExchangeProcessor,
    transport::{FrameTransport, ReceiveOutcome, TransportError},
};

/// Default receive window per cycle.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(50);

/// Default consecutive link errors before the fail-safe engages.
pub const DEFAULT_FAIL_SAFE_THRESHOLD: u32 = 3;

/// Default valid exchanges held in the safe state before commands apply
/// again.
pub const DEFAULT_RECOVERY_EXCHANGES: u32 = 3;

/// What to do with a well-formed request of an unrecognized kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownKindPolicy {
    /// Answer with an error response naming the kind
    #[default]
    Reject,
    /// Send nothing and return to Idle
    Ignore,
}

/// Exchange loop configuration.
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    /// Receive window per cycle
    pub request_timeout: Duration,
    /// Consecutive receive/send failures that engage the fail-safe
    pub fail_safe_threshold: u32,
    /// Valid exchanges held in the safe state before commands apply again
    pub recovery_exchanges: u32,
    /// Handling of unrecognized request kinds
    pub unknown_kind_policy: UnknownKindPolicy,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            fail_safe_threshold: DEFAULT_FAIL_SAFE_THRESHOLD,
            recovery_exchanges: DEFAULT_RECOVERY_EXCHANGES,
            unknown_kind_policy: UnknownKindPolicy::default(),
        }
    }
}

/// Where the loop is within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    /// Between cycles
    Idle,
    /// Waiting for a frame
    Receiving,
    /// Turning the frame into a request
    Decoding,
    /// Selecting the handler for the request kind
    Dispatching,
    /// Handler running against the processor
    Processing,
    /// Serializing the response
    Encoding,
    /// Handing the response frame to the transport
    Sending,
    /// Link lost; the loop has stopped
    Fatal,
}

/// Running counters. Monotonic over the life of the loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExchangeStats {
    /// Cycles started
    pub cycles: u64,
    /// Responses handed to the transport successfully
    pub responses: u64,
    /// Receive windows that elapsed without a frame
    pub timeouts: u64,
    /// Receive or send failures
    pub transport_errors: u64,
    /// Frames discarded because they failed to decode
    pub malformed_frames: u64,
    /// Requests of unrecognized kinds, whether rejected or ignored
    pub unknown_kinds: u64,
    /// Commands refused by validation
    pub rejected_commands: u64,
    /// Commands applied to the processor
    pub applied_commands: u64,
    /// Times the fail-safe engaged
    pub fail_safe_engagements: u64,
    /// Responses that failed to encode
    pub encode_errors: u64,
}

/// Per-cycle scratch space.
///
/// Owned by the loop and reused across cycles so the steady state does not
/// allocate. Cleared at the start of every cycle.
#[derive(Debug)]
struct CycleBuffers {
    response: Option<EscResponse>,
    outbound: Vec<u8>,
}

impl CycleBuffers {
    fn new() -> Self {
        Self { response: None, outbound: Vec::with_capacity(MAX_FRAME_SIZE) }
    }

    fn clear(&mut self) {
        self.response = None;
        self.outbound.clear();
    }
}

/// Drives the receive → decode → dispatch → process → encode → send cycle.
///
/// Single-threaded; one request is processed at a time. Only
/// [`FrameTransport::receive`] blocks.
#[derive(Debug)]
pub struct ExchangeLoop<T, C, P> {
    transport: T,
    codec: C,
    processor: P,
    config: ExchangeConfig,
    monitor: LinkMonitor,
    phase: CyclePhase,
    stats: ExchangeStats,
    buffers: CycleBuffers,
}

impl<T, C, P> ExchangeLoop<T, C, P>
where
    T: FrameTransport,
    C: MessageCodec,
    P: ExchangeProcessor,
{
    /// Create a loop in the Idle phase.
    pub fn new(transport: T, codec: C, processor: P, config: ExchangeConfig) -> Self {
        let monitor = LinkMonitor::new(config.fail_safe_threshold, config.recovery_exchanges);

        Self {
            transport,
            codec,
            processor,
            config,
            monitor,
            phase: CyclePhase::Idle,
            stats: ExchangeStats::default(),
            buffers: CycleBuffers::new(),
        }
    }

    /// Run cycles until the link is lost.
    ///
    /// Recoverable errors are logged and counted, and the loop carries on.
    ///
    /// # Errors
    ///
    /// Returns the fatal transport error. The fail-safe has already engaged
    /// by then.
    pub fn run(&mut self) -> Result<Infallible, ExchangeError> {
        loop {
            if let Err(err) = self.run_cycle()
                && err.is_fatal()
            {
                return Err(err);
            }
        }
    }

    /// Run cycles until `stop` returns true for the current stats.
    ///
    /// `stop` is checked before every cycle.
    ///
    /// # Errors
    ///
    /// Returns the fatal transport error if the link is lost first.
    pub fn run_until(
        &mut self,
        mut stop: impl FnMut(&ExchangeStats) -> bool,
    ) -> Result<ExchangeStats, ExchangeError> {
        while !stop(&self.stats) {
            if let Err(err) = self.run_cycle()
                && err.is_fatal()
            {
                return Err(err);
            }
        }

        Ok(self.stats)
    }

    /// Run exactly `cycles` cycles, stopping early only on link loss.
    ///
    /// # Errors
    ///
    /// Returns the fatal transport error if the link is lost first.
    pub fn run_cycles(&mut self, cycles: u64) -> Result<ExchangeStats, ExchangeError> {
        let target = self.stats.cycles.saturating_add(cycles);
        self.run_until(|stats| stats.cycles >= target)
    }

    /// Run one full cycle.
    ///
    /// Returns the kind of the response that was sent.
    ///
    /// # Errors
    ///
    /// Returns why the cycle ended without sending a response. The loop is
    /// back in [`CyclePhase::Idle`] afterwards unless the error is fatal.
    pub fn run_cycle(&mut self) -> Result<MessageKind, ExchangeError> {
        self.buffers.clear();
        self.stats.cycles += 1;

        let result = self.exchange();

        match &result {
            Ok(kind) => {
                self.stats.responses += 1;
                trace!(kind = kind.name(), "response sent");
            },
            Err(err) => self.record_failure(err),
        }

        self.phase = match &result {
            Err(err) if err.is_fatal() => CyclePhase::Fatal,
            _ => CyclePhase::Idle,
        };

        result
    }

    fn exchange(&mut self) -> Result<MessageKind, ExchangeError> {
        self.enter(CyclePhase::Receiving);
        let timeout = self.config.request_timeout;
        let frame = match self.transport.receive(timeout) {
            Ok(ReceiveOutcome::Frame(frame)) => frame,
            Ok(ReceiveOutcome::Timeout) => return Err(ExchangeError::ReceiveTimeout { timeout }),
            Err(err) => return Err(self.link_failure(err)),
        };

        self.enter(CyclePhase::Decoding);
        let request = self.codec.decode(&frame).map_err(ExchangeError::MalformedFrame)?;

        self.enter(CyclePhase::Dispatching);
        let response = self.dispatch(request)?;
        let kind = response.kind();

        self.enter(CyclePhase::Encoding);
        let response = self.buffers.response.insert(response);
        self.codec.encode(response, &mut self.buffers.outbound).map_err(ExchangeError::Encode)?;

        self.enter(CyclePhase::Sending);
        if let Err(err) = self.transport.send(&self.buffers.outbound) {
            return Err(self.link_failure(err));
        }
        self.monitor.record_exchange();

        Ok(kind)
    }

    /// Feed a transport failure to the monitor, engaging the fail-safe if it
    /// trips.
    fn link_failure(&mut self, err: TransportError) -> ExchangeError {
        let engaged = if err.is_fatal() {
            self.monitor.record_link_lost()
        } else {
            self.monitor.record_link_error()
        };

        if engaged {
            self.enter_safe_state(&err);
        }

        ExchangeError::Transport(err)
    }

    fn enter_safe_state(&mut self, reason: &dyn std::fmt::Display) {
        self.processor.enter_safe_state();
        self.stats.fail_safe_engagements += 1;
        error!(
            consecutive_errors = self.monitor.consecutive_errors(),
            reason = %reason,
            "fail-safe engaged, motors commanded to safe state"
        );
    }

    fn record_failure(&mut self, err: &ExchangeError) {
        match err {
            ExchangeError::ReceiveTimeout { .. } => {
                self.stats.timeouts += 1;
                trace!("receive window elapsed");
            },
            ExchangeError::Transport(e) if e.is_fatal() => {
                self.stats.transport_errors += 1;
                error!(phase = ?self.phase, error = %e, "link lost");
            },
            ExchangeError::Transport(e) => {
                self.stats.transport_errors += 1;
                warn!(
                    phase = ?self.phase,
                    error = %e,
                    consecutive_errors = self.monitor.consecutive_errors(),
                    "transport error"
                );
            },
            ExchangeError::MalformedFrame(e) => {
                self.stats.malformed_frames += 1;
                warn!(error = %e, "discarding malformed frame");
            },
            // Counted and logged at dispatch
            ExchangeError::UnknownRequestKind { .. } => {},
            ExchangeError::Encode(e) => {
                self.stats.encode_errors += 1;
                error!(error = %e, "failed to encode response");
            },
        }
    }

    fn enter(&mut self, phase: CyclePhase) {
        trace!(from = ?self.phase, to = ?phase, "cycle phase");
        self.phase = phase;
    }

    /// Force the fail-safe on before any link error has been seen.
    ///
    /// Commands are held off until the recovery exchanges have passed. Does
    /// nothing if already engaged.
    pub fn engage_fail_safe(&mut self) {
        if self.monitor.engage() {
            self.enter_safe_state(&"engaged by host");
        }
    }

    /// Current phase. [`CyclePhase::Idle`] between cycles.
    pub fn phase(&self) -> CyclePhase {
        self.phase
    }

    /// Counters since construction.
    pub fn stats(&self) -> ExchangeStats {
        self.stats
    }

    /// Returns true while the motors are held in the safe state.
    pub fn fail_safe_engaged(&self) -> bool {
        self.monitor.is_engaged()
    }

    /// Link health tracker.
    pub fn monitor(&self) -> &LinkMonitor {
        &self.monitor
    }

    /// Response built in the most recent cycle, if it got that far.
    pub fn cycle_response(&self) -> Option<&EscResponse> {
        self.buffers.response.as_ref()
    }

    /// Configuration the loop was built with.
    pub fn config(&self) -> &ExchangeConfig {
        &self.config
    }

    /// The frame transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// The frame transport, mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// The exchange processor.
    pub fn processor(&self) -> &P {
        &self.processor
    }

    /// Tear the loop down, returning transport and processor.
    pub fn into_parts(self) -> (T, P) {
        (self.transport, self.processor)
    }
}
