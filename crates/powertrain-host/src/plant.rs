//! Bench stand-in for the motor hardware.
//!
//! Moves the measured state toward what the command asks for with a
//! first-order lag. Good enough to see sensible numbers on the bench; there
//! is no control algorithm here.

use std::time::Duration;

use powertrain_proto::{Direction, MotorCommand};

use crate::motor::SharedMotor;

/// Plant constants.
#[derive(Debug, Clone)]
pub struct PlantParams {
    /// Speed at full throttle
    pub max_rpm: f32,
    /// Phase current at full throttle or full regen
    pub max_phase_current_amps: f32,
    /// Bus voltage with no load
    pub nominal_bus_voltage_volts: f32,
    /// Bus sag per amp of phase current
    pub bus_sag_volts_per_amp: f32,
    /// Controller temperature at rest
    pub ambient_temp_celsius: f32,
    /// Steady-state temperature rise per amp
    pub temp_rise_per_amp: f32,
    /// Time constant of the speed and current response
    pub time_constant: Duration,
    /// Time constant of the temperature response
    pub thermal_time_constant: Duration,
}

impl Default for PlantParams {
    fn default() -> Self {
        Self {
            max_rpm: 6000.0,
            max_phase_current_amps: 120.0,
            nominal_bus_voltage_volts: 48.0,
            bus_sag_volts_per_amp: 0.02,
            ambient_temp_celsius: 25.0,
            temp_rise_per_amp: 0.4,
            time_constant: Duration::from_millis(250),
            thermal_time_constant: Duration::from_secs(30),
        }
    }
}

/// First-order motor model writing into [`SharedMotor`].
#[derive(Debug)]
pub struct BenchPlant {
    motor: SharedMotor,
    params: PlantParams,
    rpm: f32,
    current: f32,
    temp: f32,
}

impl BenchPlant {
    /// Plant at rest and ambient temperature.
    pub fn new(motor: SharedMotor, params: PlantParams) -> Self {
        let temp = params.ambient_temp_celsius;
        Self { motor, params, rpm: 0.0, current: 0.0, temp }
    }

    /// Advance the model by `dt` and publish the new measurements.
    pub fn tick(&mut self, dt: Duration) {
        let params = &self.params;
        let rpm = &mut self.rpm;
        let current = &mut self.current;
        let temp = &mut self.temp;

        self.motor.update_measurements(|command, measured| {
            let (target_rpm, target_current) = targets(command, params);
            let alpha = lag(dt, params.time_constant);
            *rpm += (target_rpm - *rpm) * alpha;
            *current += (target_current - *current) * alpha;

            let target_temp =
                params.ambient_temp_celsius + params.temp_rise_per_amp * current.abs();
            *temp += (target_temp - *temp) * lag(dt, params.thermal_time_constant);

            measured.motor_rpm = rpm.round() as i32;
            measured.phase_current_amps = current.abs();
            measured.bus_voltage_volts =
                params.nominal_bus_voltage_volts - params.bus_sag_volts_per_amp * current.abs();
            measured.controller_temp_celsius = *temp;
        });
    }
}

/// Steady-state speed and current for a command.
fn targets(command: &MotorCommand, params: &PlantParams) -> (f32, f32) {
    if !command.armed {
        return (0.0, 0.0);
    }

    let sign = match command.direction {
        Direction::Forward => 1.0,
        Direction::Reverse => -1.0,
    };
    let drive = (command.throttle - command.regen).max(0.0);
    let current = (command.throttle + command.regen).min(1.0) * params.max_phase_current_amps;

    (sign * drive * params.max_rpm, current)
}

/// Fraction of the remaining gap closed in `dt`.
fn lag(dt: Duration, time_constant: Duration) -> f32 {
    if time_constant.is_zero() {
        return 1.0;
    }
    (dt.as_secs_f32() / time_constant.as_secs_f32()).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settle(plant: &mut BenchPlant) {
        for _ in 0..400 {
            plant.tick(Duration::from_millis(10));
        }
    }

    #[test]
    fn disarmed_plant_stays_at_rest() {
        let motor = SharedMotor::new();
        let mut plant = BenchPlant::new(motor.clone(), PlantParams::default());

        settle(&mut plant);

        let state = motor.snapshot();
        assert_eq!(state.motor_rpm, 0);
        assert_eq!(state.phase_current_amps, 0.0);
        assert_eq!(state.bus_voltage_volts, 48.0);
    }

    #[test]
    fn speed_follows_throttle_and_direction() {
        let motor = SharedMotor::new();
        let mut plant = BenchPlant::new(motor.clone(), PlantParams::default());

        motor.apply(&MotorCommand {
            throttle: 0.5,
            regen: 0.0,
            direction: Direction::Reverse,
            armed: true,
        });
        settle(&mut plant);

        let state = motor.snapshot();
        assert!((state.motor_rpm + 3000).abs() <= 1, "rpm {}", state.motor_rpm);
        assert!(state.bus_voltage_volts < 48.0);
    }

    #[test]
    fn safe_command_spins_down() {
        let motor = SharedMotor::new();
        let mut plant = BenchPlant::new(motor.clone(), PlantParams::default());

        motor.apply(&MotorCommand { throttle: 1.0, armed: true, ..MotorCommand::SAFE });
        settle(&mut plant);
        assert!(motor.snapshot().motor_rpm > 5000);

        motor.apply(&MotorCommand::SAFE);
        settle(&mut plant);
        assert_eq!(motor.snapshot().motor_rpm, 0);
    }
}
