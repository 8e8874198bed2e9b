//! Powertrain host binary.
//!
//! # Usage
//!
//! ```bash
//! # Serial port exposed by a TCP bridge (ser2net, bench simulator)
//! powertrain-host --connect 127.0.0.1:2000
//!
//! # Tighter receive window, stricter fail-safe
//! powertrain-host --connect 10.0.0.5:2000 --request-timeout-ms 20 --fail-safe-threshold 2
//! ```

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use clap::Parser;
use powertrain_core::{ExchangeConfig, UnknownKindPolicy};
use powertrain_host::{Host, HostConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Powertrain host
#[derive(Parser, Debug)]
#[command(name = "powertrain-host")]
#[command(about = "Answers ESC state exchanges over a serial bridge")]
#[command(version)]
struct Args {
    /// Serial bridge address
    #[arg(short, long, default_value = "127.0.0.1:2000")]
    connect: String,

    /// Receive window per exchange cycle, in milliseconds
    #[arg(long, default_value = "50")]
    request_timeout_ms: u64,

    /// Consecutive link errors before the fail-safe engages
    #[arg(long, default_value = "3")]
    fail_safe_threshold: u32,

    /// Valid exchanges held in the safe state before commands apply again
    #[arg(long, default_value = "3")]
    recovery_exchanges: u32,

    /// Drop requests of unknown kinds instead of answering with an error
    #[arg(long)]
    ignore_unknown: bool,

    /// Delay before reconnecting after link loss, in milliseconds
    #[arg(long, default_value = "500")]
    reconnect_delay_ms: u64,

    /// Plant model step, in milliseconds
    #[arg(long, default_value = "10")]
    plant_tick_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("Powertrain host starting");
    tracing::info!("ESC link at {}", args.connect);

    let unknown_kind_policy =
        if args.ignore_unknown { UnknownKindPolicy::Ignore } else { UnknownKindPolicy::Reject };

    let config = HostConfig {
        connect: args.connect,
        exchange: ExchangeConfig {
            request_timeout: Duration::from_millis(args.request_timeout_ms),
            fail_safe_threshold: args.fail_safe_threshold,
            recovery_exchanges: args.recovery_exchanges,
            unknown_kind_policy,
        },
        reconnect_delay: Duration::from_millis(args.reconnect_delay_ms),
        plant_tick: Duration::from_millis(args.plant_tick_ms),
        ..Default::default()
    };

    let host = Host::new(config)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown requested"),
            Err(e) => tracing::error!("Signal handler failed: {}", e),
        }
        flag.store(true, Ordering::Release);
    });

    host.run(shutdown).await?;

    Ok(())
}
