//! Motor command/state storage shared between the exchange loop and the
//! motor-control tick.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use powertrain_core::ExchangeProcessor;
use powertrain_proto::{MeasuredState, MotorCommand};

#[derive(Debug, Default)]
struct MotorState {
    command: MotorCommand,
    measured: MeasuredState,
}

/// Commanded and measured motor state behind one lock.
///
/// Every accessor is a single critical section, so the control tick never
/// sees half of a command.
#[derive(Debug, Clone, Default)]
pub struct SharedMotor {
    inner: Arc<Mutex<MotorState>>,
}

impl SharedMotor {
    /// Storage starting in the safe state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the commanded setpoints.
    pub fn apply(&self, command: &MotorCommand) {
        self.lock().command = *command;
    }

    /// Command currently in effect.
    pub fn command(&self) -> MotorCommand {
        self.lock().command
    }

    /// Measured state with the command in effect.
    pub fn snapshot(&self) -> MeasuredState {
        let state = self.lock();
        MeasuredState { applied: state.command, ..state.measured }
    }

    /// Update measurements from the current command in one critical section.
    pub fn update_measurements(&self, update: impl FnOnce(&MotorCommand, &mut MeasuredState)) {
        let mut state = self.lock();
        let MotorState { command, measured } = &mut *state;
        update(command, measured);
    }

    // Poisoning is ignored: critical sections only copy plain data, so a
    // panicking holder cannot leave a torn command behind.
    fn lock(&self) -> MutexGuard<'_, MotorState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// [`ExchangeProcessor`] backed by [`SharedMotor`].
#[derive(Debug, Clone)]
pub struct MotorProcessor {
    motor: SharedMotor,
}

impl MotorProcessor {
    /// Processor writing to `motor`.
    pub fn new(motor: SharedMotor) -> Self {
        Self { motor }
    }
}

impl ExchangeProcessor for MotorProcessor {
    fn apply_command(&mut self, command: &MotorCommand) {
        self.motor.apply(command);
    }

    fn read_state(&self) -> MeasuredState {
        self.motor.snapshot()
    }
}
