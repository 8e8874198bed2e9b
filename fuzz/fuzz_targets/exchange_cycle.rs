//! Fuzz target for the exchange loop under an arbitrary link
//!
//! # Strategy
//!
//! - Valid state exchanges with arbitrary (possibly invalid) setpoints
//! - Raw frames of arbitrary bytes
//! - Timeouts and recoverable link errors in any order
//!
//! # Invariants
//!
//! - The loop never panics and never stops on recoverable errors
//! - Every response decodes and answers a request of the same cycle
//! - Only commands that pass validation reach the processor
//! - The safe state is entered at most once per engagement

#![no_main]

use arbitrary::Arbitrary;
use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use powertrain_core::{CborCodec, ExchangeConfig, ExchangeLoop, TransportError};
use powertrain_harness::{RecordingProcessor, ScriptStep, ScriptedTransport, SimEsc};
use powertrain_proto::{Direction, MotorCommand};

#[derive(Debug, Clone, Arbitrary)]
enum LinkStep {
    Exchange { throttle: f32, regen: f32, reverse: bool, armed: bool, with_command: bool },
    Raw(Vec<u8>),
    Timeout,
    Error,
}

#[derive(Debug, Clone, Arbitrary)]
struct Scenario {
    threshold: u8,
    recovery: u8,
    steps: Vec<LinkStep>,
}

fuzz_target!(|scenario: Scenario| {
    let mut esc = SimEsc::new();
    let mut script = Vec::with_capacity(scenario.steps.len());

    for step in &scenario.steps {
        let step = match step {
            LinkStep::Exchange { throttle, regen, reverse, armed, with_command } => {
                let direction = if *reverse { Direction::Reverse } else { Direction::Forward };
                let command = with_command.then_some(MotorCommand {
                    throttle: *throttle,
                    regen: *regen,
                    direction,
                    armed: *armed,
                });
                match esc.exchange_state(command) {
                    Ok(frame) => ScriptStep::Frame(frame),
                    Err(_) => continue,
                }
            },
            LinkStep::Raw(bytes) => ScriptStep::Frame(Bytes::from(bytes.clone())),
            LinkStep::Timeout => ScriptStep::Timeout,
            LinkStep::Error => ScriptStep::Error(TransportError::Io("fuzz".to_string())),
        };
        script.push(step);
    }

    let cycles = script.len() as u64;
    let config = ExchangeConfig {
        fail_safe_threshold: u32::from(scenario.threshold % 8),
        recovery_exchanges: u32::from(scenario.recovery % 8),
        ..ExchangeConfig::default()
    };
    let mut exchange = ExchangeLoop::new(
        ScriptedTransport::new(script),
        CborCodec,
        RecordingProcessor::new(),
        config,
    );

    assert!(exchange.run_cycles(cycles).is_ok());

    for frame in exchange.transport().sent() {
        assert!(SimEsc::read_response(frame).is_ok());
    }
    for command in exchange.processor().applied() {
        assert!(command.validate().is_ok());
    }

    let stats = exchange.stats();
    assert_eq!(exchange.processor().safe_state_entries() as u64, stats.fail_safe_engagements);
});
