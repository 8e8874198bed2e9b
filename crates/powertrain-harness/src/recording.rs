//! Processor that records every call.

use std::cell::Cell;

use powertrain_core::ExchangeProcessor;
use powertrain_proto::{MeasuredState, MotorCommand};

/// In-memory motor storage that remembers what it was told.
///
/// `read_state` reports the configured measurements with `applied` set to
/// the current command, so responses echo what actually took effect.
#[derive(Debug, Clone, Default)]
pub struct RecordingProcessor {
    current: MotorCommand,
    measurements: MeasuredState,
    applied: Vec<MotorCommand>,
    safe_state_entries: usize,
    state_reads: Cell<usize>,
}

impl RecordingProcessor {
    /// Processor starting in the safe state with zeroed measurements.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the measurements reported by later reads.
    pub fn set_measurements(&mut self, measurements: MeasuredState) {
        self.measurements = measurements;
    }

    /// Command currently in effect.
    pub fn current(&self) -> MotorCommand {
        self.current
    }

    /// Every command passed to `apply_command`, in order.
    ///
    /// Includes the safe command applied on fail-safe entry.
    pub fn applied(&self) -> &[MotorCommand] {
        &self.applied
    }

    /// Number of fail-safe entries.
    pub fn safe_state_entries(&self) -> usize {
        self.safe_state_entries
    }

    /// Number of state reads.
    pub fn state_reads(&self) -> usize {
        self.state_reads.get()
    }
}

impl ExchangeProcessor for RecordingProcessor {
    fn apply_command(&mut self, command: &MotorCommand) {
        self.current = *command;
        self.applied.push(*command);
    }

    fn read_state(&self) -> MeasuredState {
        self.state_reads.set(self.state_reads.get() + 1);
        MeasuredState { applied: self.current, ..self.measurements }
    }

    fn enter_safe_state(&mut self) {
        self.safe_state_entries += 1;
        self.apply_command(&MotorCommand::SAFE);
    }
}
