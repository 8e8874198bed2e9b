//! Reconnecting host runtime.
//!
//! The exchange loop is synchronous and bounded by its receive window, so
//! each session runs on a blocking thread. The plant ticks on the async
//! runtime alongside it. A lost link ends the session with the motors
//! already safe; the next session starts with the fail-safe engaged so the
//! first commands after a reconnect are held off.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use powertrain_core::{CborCodec, ExchangeConfig, ExchangeLoop, ExchangeStats};
use powertrain_proto::MotorCommand;
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tracing::{info, warn};

use crate::{
    error::HostError,
    motor::{MotorProcessor, SharedMotor},
    plant::{BenchPlant, PlantParams},
    transport::connect_tcp,
};

/// Host runtime configuration.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Serial bridge address (e.g., "127.0.0.1:2000")
    pub connect: String,
    /// Exchange loop configuration (timeouts, fail-safe)
    pub exchange: ExchangeConfig,
    /// Wait between a lost session and the next connect attempt
    pub reconnect_delay: Duration,
    /// Socket read timeout while waiting for a frame
    pub poll_interval: Duration,
    /// Plant model step
    pub plant_tick: Duration,
    /// Plant model constants
    pub plant: PlantParams,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            connect: "127.0.0.1:2000".to_string(),
            exchange: ExchangeConfig::default(),
            reconnect_delay: Duration::from_millis(500),
            poll_interval: Duration::from_millis(5),
            plant_tick: Duration::from_millis(10),
            plant: PlantParams::default(),
        }
    }
}

impl HostConfig {
    /// Check the configuration before anything starts.
    ///
    /// # Errors
    ///
    /// `HostError::Config` naming the first bad setting.
    pub fn validate(&self) -> Result<(), HostError> {
        if self.connect.trim().is_empty() {
            return Err(HostError::Config("bridge address is empty".to_string()));
        }
        if self.exchange.request_timeout.is_zero() {
            return Err(HostError::Config("request timeout must be non-zero".to_string()));
        }
        if self.plant_tick.is_zero() {
            return Err(HostError::Config("plant tick must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Production powertrain host.
#[derive(Debug)]
pub struct Host {
    config: HostConfig,
    motor: SharedMotor,
}

impl Host {
    /// Host with motors in the safe state.
    ///
    /// # Errors
    ///
    /// `HostError::Config` if the configuration is invalid.
    pub fn new(config: HostConfig) -> Result<Self, HostError> {
        config.validate()?;
        Ok(Self { config, motor: SharedMotor::new() })
    }

    /// Motor storage the sessions write to.
    pub fn motor(&self) -> &SharedMotor {
        &self.motor
    }

    /// Configuration in use.
    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    /// Serve the ESC link until `shutdown` is set.
    ///
    /// Link loss and connect failures are logged and retried after the
    /// reconnect delay. The motors are commanded safe before returning.
    ///
    /// # Errors
    ///
    /// `HostError::Internal` if a session thread panics.
    pub async fn run(&self, shutdown: Arc<AtomicBool>) -> Result<(), HostError> {
        let plant = self.spawn_plant();
        let result = self.serve(&shutdown).await;
        plant.abort();

        self.motor.apply(&MotorCommand::SAFE);
        info!("host stopped, motors safe");
        result
    }

    async fn serve(&self, shutdown: &Arc<AtomicBool>) -> Result<(), HostError> {
        let mut link_lost = false;

        while !shutdown.load(Ordering::Acquire) {
            let config = self.config.clone();
            let motor = self.motor.clone();
            let flag = Arc::clone(shutdown);

            let session = tokio::task::spawn_blocking(move || {
                run_session(&config, motor, &flag, link_lost)
            })
            .await
            .map_err(|e| HostError::Internal(format!("session task failed: {e}")))?;

            match session {
                Ok(stats) => {
                    info!(
                        cycles = stats.cycles,
                        responses = stats.responses,
                        timeouts = stats.timeouts,
                        fail_safe_engagements = stats.fail_safe_engagements,
                        "session ended"
                    );
                },
                Err(HostError::Link(err)) => {
                    warn!(error = %err, "ESC link lost");
                    link_lost = true;
                },
                Err(HostError::Connect(msg)) => {
                    warn!(addr = %self.config.connect, error = %msg, "connect failed");
                },
                Err(err) => return Err(err),
            }

            if shutdown.load(Ordering::Acquire) {
                break;
            }
            tokio::time::sleep(self.config.reconnect_delay).await;
        }

        Ok(())
    }

    fn spawn_plant(&self) -> JoinHandle<()> {
        let tick = self.config.plant_tick;
        let mut plant = BenchPlant::new(self.motor.clone(), self.config.plant.clone());

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                plant.tick(tick);
            }
        })
    }
}

/// One connection to the bridge, served until shutdown or link loss.
fn run_session(
    config: &HostConfig,
    motor: SharedMotor,
    shutdown: &AtomicBool,
    after_link_loss: bool,
) -> Result<ExchangeStats, HostError> {
    let transport = connect_tcp(config.connect.as_str(), config.poll_interval)?;
    info!(addr = %config.connect, "connected to ESC link");

    let mut exchange = ExchangeLoop::new(
        transport,
        CborCodec,
        MotorProcessor::new(motor),
        config.exchange.clone(),
    );
    if after_link_loss {
        exchange.engage_fail_safe();
    }

    let stats = exchange.run_until(|_| shutdown.load(Ordering::Acquire))?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(HostConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_request_timeout_is_rejected() {
        let mut config = HostConfig::default();
        config.exchange.request_timeout = Duration::ZERO;

        assert!(matches!(Host::new(config), Err(HostError::Config(_))));
    }

    #[test]
    fn zero_plant_tick_is_rejected() {
        let config = HostConfig { plant_tick: Duration::ZERO, ..HostConfig::default() };

        assert!(matches!(config.validate(), Err(HostError::Config(_))));
    }

    #[test]
    fn empty_address_is_rejected() {
        let config = HostConfig { connect: "  ".to_string(), ..HostConfig::default() };

        assert!(matches!(config.validate(), Err(HostError::Config(_))));
    }

    #[test]
    fn new_host_starts_safe() {
        let host = Host::new(HostConfig::default()).unwrap();

        assert_eq!(host.motor().command(), MotorCommand::SAFE);
    }
}
