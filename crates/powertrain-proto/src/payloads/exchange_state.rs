//! State exchange payloads.
//!
//! The ESC sends its commanded setpoints; the host applies them and answers
//! with the measured motor state taken after application.

use serde::{Deserialize, Serialize};

use crate::errors::CommandError;

/// Rotation direction requested from the motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    /// Normal drive direction
    Forward,
    /// Reverse (parking manoeuvres)
    Reverse,
}

/// Commanded motor setpoints.
///
/// Throttle and regen are normalized to `0.0..=1.0`; the motor layer maps
/// them onto hardware limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotorCommand {
    /// Drive torque request, fraction of maximum
    pub throttle: f32,
    /// Regenerative braking request, fraction of maximum
    pub regen: f32,
    /// Requested rotation direction
    pub direction: Direction,
    /// Power stage enabled. Nothing is driven while disarmed.
    pub armed: bool,
}

impl MotorCommand {
    /// Defined safe state: zero torque, zero regen, power stage disarmed.
    pub const SAFE: Self =
        Self { throttle: 0.0, regen: 0.0, direction: Direction::Forward, armed: false };

    /// Check every setpoint before anything is applied.
    ///
    /// # Errors
    ///
    /// - `CommandError::NotFinite` for NaN or infinite setpoints
    /// - `CommandError::OutOfRange` for setpoints outside `0.0..=1.0`
    pub fn validate(&self) -> Result<(), CommandError> {
        check_unit_interval("throttle", self.throttle)?;
        check_unit_interval("regen", self.regen)
    }

    /// Whether this command drives no torque at all.
    #[must_use]
    pub fn is_safe(&self) -> bool {
        !self.armed || (self.throttle == 0.0 && self.regen == 0.0)
    }
}

impl Default for MotorCommand {
    fn default() -> Self {
        Self::SAFE
    }
}

fn check_unit_interval(field: &'static str, value: f32) -> Result<(), CommandError> {
    if !value.is_finite() {
        return Err(CommandError::NotFinite { field });
    }
    if !(0.0..=1.0).contains(&value) {
        return Err(CommandError::OutOfRange { field, value, min: 0.0, max: 1.0 });
    }
    Ok(())
}

/// Request half of the state exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeStateRequest {
    /// ESC-assigned counter, echoed in the response
    pub sequence: u32,
    /// New setpoints. `None` asks for state only.
    #[serde(default)]
    pub command: Option<MotorCommand>,
}

/// Motor state as measured by the host.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MeasuredState {
    /// Mechanical speed, signed by direction
    pub motor_rpm: i32,
    /// RMS phase current
    pub phase_current_amps: f32,
    /// DC bus voltage
    pub bus_voltage_volts: f32,
    /// Power stage temperature
    pub controller_temp_celsius: f32,
    /// Command currently in effect
    pub applied: MotorCommand,
}

/// Response half of the state exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeStateResponse {
    /// Sequence number of the request being answered
    pub sequence: u32,
    /// Measured state after the request was processed
    pub state: MeasuredState,
    /// Host is holding the safe state and ignoring commands
    pub fail_safe: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_command_validates() {
        assert_eq!(MotorCommand::SAFE.validate(), Ok(()));
        assert!(MotorCommand::SAFE.is_safe());
        assert_eq!(MotorCommand::default(), MotorCommand::SAFE);
    }

    #[test]
    fn rejects_out_of_range_throttle() {
        let command = MotorCommand { throttle: 1.5, ..MotorCommand::SAFE };
        assert_eq!(
            command.validate(),
            Err(CommandError::OutOfRange { field: "throttle", value: 1.5, min: 0.0, max: 1.0 })
        );
    }

    #[test]
    fn rejects_negative_regen() {
        let command = MotorCommand { regen: -0.1, ..MotorCommand::SAFE };
        assert!(matches!(
            command.validate(),
            Err(CommandError::OutOfRange { field: "regen", .. })
        ));
    }

    #[test]
    fn rejects_nan() {
        let command = MotorCommand { throttle: f32::NAN, ..MotorCommand::SAFE };
        assert_eq!(command.validate(), Err(CommandError::NotFinite { field: "throttle" }));

        let command = MotorCommand { regen: f32::INFINITY, ..MotorCommand::SAFE };
        assert_eq!(command.validate(), Err(CommandError::NotFinite { field: "regen" }));
    }

    #[test]
    fn armed_throttle_is_not_safe() {
        let command =
            MotorCommand { throttle: 0.2, regen: 0.0, direction: Direction::Forward, armed: true };
        assert!(!command.is_safe());

        let disarmed = MotorCommand { armed: false, ..command };
        assert!(disarmed.is_safe());
    }

    #[test]
    fn request_without_command_field_decodes() {
        #[derive(Serialize)]
        struct Legacy {
            sequence: u32,
        }

        let mut encoded = Vec::new();
        ciborium::ser::into_writer(&Legacy { sequence: 9 }, &mut encoded).unwrap();

        let decoded: ExchangeStateRequest = ciborium::de::from_reader(&encoded[..]).unwrap();
        assert_eq!(decoded, ExchangeStateRequest { sequence: 9, command: None });
    }
}
