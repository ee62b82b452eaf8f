//! vitolink Supervisor Binary
//!
//! Starts vcontrold and keeps it alive until Ctrl+C.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use crossbeam::channel::{bounded, select, tick};
use tracing_subscriber::{fmt, EnvFilter};
use vitolink::config::DaemonLogLevel;
use vitolink::{Config, Supervisor};

/// vitolink Supervisor
#[derive(Parser, Debug)]
#[command(name = "vitolink-supervisor")]
#[command(about = "Keeps a vcontrold daemon running and reachable")]
#[command(version)]
struct Args {
    /// Daemon working directory (binary and log file)
    #[arg(short, long, default_value = "./vcontrold_daemon")]
    base_dir: String,

    /// Serial device handed to the daemon
    #[arg(short, long, default_value = "/dev/ttyUSB0")]
    device: String,

    /// Daemon listen host
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Daemon listen port
    #[arg(short, long, default_value = "3002")]
    port: u16,

    /// Daemon log level (ERROR, WARN, INFO, DEBUG)
    #[arg(short, long, default_value = "ERROR")]
    log_level: DaemonLogLevel,

    /// Seconds between liveness checks
    #[arg(short, long, default_value = "60")]
    interval: u64,
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,vitolink=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("vitolink supervisor v{}", vitolink::VERSION);
    tracing::info!("Daemon directory: {}", args.base_dir);
    tracing::info!("Daemon address: {}:{}", args.host, args.port);

    let config = Config::builder()
        .base_dir(&args.base_dir)
        .device(&args.device)
        .host(&args.host)
        .port(args.port)
        .log_level(args.log_level)
        .update_interval(Duration::from_secs(args.interval))
        .build();

    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        return ExitCode::FAILURE;
    }

    let interval = config.update_interval;
    let supervisor = Supervisor::new(config);

    if let Err(e) = supervisor.start() {
        tracing::error!("Failed to start vcontrold: {}", e);
        return ExitCode::FAILURE;
    }

    let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::info!("Received Ctrl+C, initiating shutdown...");
        let _ = shutdown_tx.try_send(());
    }) {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
        let _ = supervisor.stop();
        return ExitCode::FAILURE;
    }

    let ticker = tick(interval);
    loop {
        select! {
            recv(shutdown_rx) -> _ => break,
            recv(ticker) -> _ => match supervisor.ensure_running() {
                Ok(true) => {}
                Ok(false) => tracing::warn!("vcontrold running but not reachable"),
                Err(e) => tracing::error!("Restart of vcontrold failed: {}", e),
            },
        }
    }

    if let Err(e) = supervisor.stop() {
        tracing::error!("Stop failed: {}", e);
        return ExitCode::FAILURE;
    }

    tracing::info!("Supervisor stopped");
    ExitCode::SUCCESS
}
