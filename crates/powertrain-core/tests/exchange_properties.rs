//! Property tests for the exchange loop.
//!
//! These tests verify invariants over arbitrary link behaviour:
//! - Every well-formed state request is answered with a state response
//! - Bytes that do not decode never reach the processor or the wire
//! - Only validated commands are ever applied
//! - Every fail-safe engagement drives the processor to the safe state
//! - The loop survives a chaotic link without stopping

use bytes::Bytes;
use powertrain_core::{
    CborCodec, CyclePhase, ExchangeConfig, ExchangeLoop, TransportError, UnknownKindPolicy,
};
use powertrain_harness::{
    ChaosConfig, ChaoticTransport, RecordingProcessor, ScriptStep, ScriptedTransport, SimEsc,
};
use powertrain_proto::{
    Direction, ErrorResponse, EscRequest, EscResponse, MessageKind, MotorCommand,
};
use proptest::prelude::*;

fn arbitrary_command() -> impl Strategy<Value = MotorCommand> {
    (
        -0.5f32..1.5,
        -0.5f32..1.5,
        prop_oneof![Just(Direction::Forward), Just(Direction::Reverse)],
        any::<bool>(),
    )
        .prop_map(|(throttle, regen, direction, armed)| MotorCommand {
            throttle,
            regen,
            direction,
            armed,
        })
}

fn valid_command() -> impl Strategy<Value = MotorCommand> {
    (0.0f32..=1.0, 0.0f32..=1.0, any::<bool>()).prop_map(|(throttle, regen, armed)| {
        MotorCommand { throttle, regen, direction: Direction::Forward, armed }
    })
}

/// What the ESC side of the link does in one cycle.
#[derive(Debug, Clone)]
enum LinkEvent {
    Request(Option<MotorCommand>),
    UnknownKind(u16),
    Garbage(Vec<u8>),
    Timeout,
    Error,
}

fn link_event() -> impl Strategy<Value = LinkEvent> {
    prop_oneof![
        4 => prop::option::of(arbitrary_command()).prop_map(LinkEvent::Request),
        1 => (0x0100u16..).prop_map(LinkEvent::UnknownKind),
        1 => prop::collection::vec(any::<u8>(), 0..64).prop_map(LinkEvent::Garbage),
        2 => Just(LinkEvent::Timeout),
        2 => Just(LinkEvent::Error),
    ]
}

fn script(events: &[LinkEvent]) -> Vec<ScriptStep> {
    let mut esc = SimEsc::new();
    events
        .iter()
        .map(|event| match event {
            LinkEvent::Request(command) => {
                ScriptStep::Frame(esc.exchange_state(*command).unwrap())
            },
            LinkEvent::UnknownKind(kind) => {
                ScriptStep::Frame(SimEsc::raw_kind(*kind, &[]).unwrap())
            },
            LinkEvent::Garbage(bytes) => ScriptStep::Frame(Bytes::from(bytes.clone())),
            LinkEvent::Timeout => ScriptStep::Timeout,
            LinkEvent::Error => ScriptStep::Error(TransportError::Io("noise".to_string())),
        })
        .collect()
}

#[test]
fn prop_valid_request_yields_state_response() {
    proptest!(|(
        sequence_offset in 0usize..4,
        command in prop::option::of(valid_command()),
    )| {
        let mut esc = SimEsc::new();
        for _ in 0..sequence_offset {
            esc.exchange_state(None).unwrap();
        }
        let frame = esc.exchange_state(command).unwrap();

        let mut exchange = ExchangeLoop::new(
            ScriptedTransport::with_frames([frame]),
            CborCodec,
            RecordingProcessor::new(),
            ExchangeConfig::default(),
        );

        prop_assert_eq!(exchange.run_cycle().unwrap(), MessageKind::ExchangeState);

        let sent = exchange.transport().sent();
        prop_assert_eq!(sent.len(), 1);
        match SimEsc::read_response(&sent[0]).unwrap() {
            EscResponse::ExchangeState(response) => {
                prop_assert_eq!(response.sequence, sequence_offset as u32);
                prop_assert_eq!(response.state.applied, command.unwrap_or(MotorCommand::SAFE));
            },
            other => prop_assert!(false, "expected state response, got {:?}", other),
        }
    });
}

#[test]
fn prop_undecodable_bytes_touch_nothing() {
    proptest!(|(bytes in prop::collection::vec(any::<u8>(), 0..128))| {
        let decodes = EscRequest::decode(&bytes).is_ok();

        let mut exchange = ExchangeLoop::new(
            ScriptedTransport::with_frames([Bytes::from(bytes)]),
            CborCodec,
            RecordingProcessor::new(),
            ExchangeConfig::default(),
        );
        let result = exchange.run_cycle();

        prop_assert_eq!(exchange.phase(), CyclePhase::Idle);
        if !decodes {
            prop_assert!(result.is_err());
            prop_assert!(exchange.processor().applied().is_empty());
            prop_assert!(exchange.transport().sent().is_empty());
        }
    });
}

#[test]
fn prop_loop_invariants_hold_for_any_link_behaviour() {
    proptest!(|(
        events in prop::collection::vec(link_event(), 1..80),
        threshold in 1u32..5,
        recovery in 0u32..4,
        ignore_unknown in any::<bool>(),
    )| {
        let config = ExchangeConfig {
            fail_safe_threshold: threshold,
            recovery_exchanges: recovery,
            unknown_kind_policy: if ignore_unknown {
                UnknownKindPolicy::Ignore
            } else {
                UnknownKindPolicy::Reject
            },
            ..ExchangeConfig::default()
        };
        let mut exchange = ExchangeLoop::new(
            ScriptedTransport::new(script(&events)),
            CborCodec,
            RecordingProcessor::new(),
            config,
        );

        let stats = exchange.run_cycles(events.len() as u64).unwrap();

        prop_assert_eq!(stats.cycles, events.len() as u64);
        prop_assert_eq!(exchange.phase(), CyclePhase::Idle);
        prop_assert_eq!(stats.responses as usize, exchange.transport().sent().len());
        prop_assert_eq!(
            stats.fail_safe_engagements as usize,
            exchange.processor().safe_state_entries()
        );

        for command in exchange.processor().applied() {
            prop_assert!(command.validate().is_ok(), "applied invalid command {:?}", command);
        }

        for frame in exchange.transport().sent() {
            prop_assert!(SimEsc::read_response(frame).is_ok());
        }

        if ignore_unknown {
            for frame in exchange.transport().sent() {
                if let Ok(EscResponse::Error(error)) = SimEsc::read_response(frame) {
                    prop_assert_ne!(error.code, ErrorResponse::UNKNOWN_REQUEST_KIND);
                }
            }
        }
    });
}

#[test]
fn prop_chaotic_link_never_stops_the_loop() {
    proptest!(|(
        seed in any::<u64>(),
        rate in 0.0f64..0.5,
        commands in prop::collection::vec(valid_command(), 10..60),
    )| {
        let mut esc = SimEsc::new();
        let frames: Vec<_> =
            commands.iter().map(|command| esc.exchange_state(Some(*command)).unwrap()).collect();
        let cycles = frames.len() as u64;

        let transport = ChaoticTransport::with_seed(
            ScriptedTransport::with_frames(frames),
            ChaosConfig::uniform(rate),
            seed,
        );
        let mut exchange = ExchangeLoop::new(
            transport,
            CborCodec,
            RecordingProcessor::new(),
            ExchangeConfig::default(),
        );

        // One inner frame is consumed per cycle at most, so the script never
        // runs dry and the link is never reported closed
        let stats = exchange.run_cycles(cycles).unwrap();

        prop_assert_eq!(stats.cycles, cycles);
        prop_assert_eq!(exchange.phase(), CyclePhase::Idle);
        prop_assert_eq!(stats.responses as usize, exchange.transport().inner().sent().len());

        let (_, processor) = exchange.into_parts();
        prop_assert_eq!(stats.fail_safe_engagements as usize, processor.safe_state_entries());
        for command in processor.applied() {
            prop_assert!(command.validate().is_ok());
        }
        if stats.fail_safe_engagements > 0 {
            prop_assert!(processor.applied().contains(&MotorCommand::SAFE));
        }
    });
}
