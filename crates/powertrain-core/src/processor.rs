//! Business logic boundary between the exchange loop and motor storage.

use powertrain_proto::{MeasuredState, MotorCommand};

/// Applies commands to, and reads state from, the motor command/state
/// storage.
///
/// That storage is shared with the motor-control tick, which may run on
/// another thread or in interrupt context. Implementations MUST make each
/// call a single critical section: a reader on the other side sees either
/// the previous command or the new one, never a mix of fields.
///
/// Commands reaching `apply_command` have already passed
/// [`MotorCommand::validate`].
pub trait ExchangeProcessor {
    /// Replace the commanded setpoints.
    fn apply_command(&mut self, command: &MotorCommand);

    /// Snapshot of the measured motor state.
    fn read_state(&self) -> MeasuredState;

    /// Force the motors into the defined safe state.
    ///
    /// Called by the fail-safe transition. Defaults to applying
    /// [`MotorCommand::SAFE`].
    fn enter_safe_state(&mut self) {
        self.apply_command(&MotorCommand::SAFE);
    }
}

impl<P: ExchangeProcessor + ?Sized> ExchangeProcessor for &mut P {
    fn apply_command(&mut self, command: &MotorCommand) {
        (**self).apply_command(command);
    }

    fn read_state(&self) -> MeasuredState {
        (**self).read_state()
    }

    fn enter_safe_state(&mut self) {
        (**self).enter_safe_state();
    }
}
