//! vitolink CLI
//!
//! One-shot access to the heating controller.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};
use vitolink::config::ConnectionMode;
use vitolink::supervisor::BinaryInfo;
use vitolink::transport::SerialTransport;
use vitolink::{Config, DynClient, Supervisor};

/// vitolink CLI
#[derive(Parser, Debug)]
#[command(name = "vitolink-cli")]
#[command(about = "Read and write a Viessmann heating controller")]
#[command(version)]
struct Args {
    /// Link to the controller
    #[arg(short, long, value_enum, default_value = "daemon")]
    mode: Mode,

    /// Serial device (serial mode)
    #[arg(short, long, default_value = "/dev/ttyUSB0")]
    device: String,

    /// vcontrold host (daemon mode)
    #[arg(long, default_value = "localhost")]
    host: String,

    /// vcontrold port (daemon mode)
    #[arg(short, long, default_value = "3002")]
    port: u16,

    /// Exchange timeout in seconds
    #[arg(short, long, default_value = "10")]
    timeout: u64,

    /// Daemon working directory (binary and log file)
    #[arg(long, default_value = "./vcontrold_daemon")]
    base_dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Mode {
    Serial,
    Daemon,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read a value (e.g. getTempKessel)
    Read {
        /// Command name
        command: String,
    },

    /// Read every known value
    ReadAll,

    /// Write a value (e.g. setTempWWsoll 45)
    Write {
        /// Command name
        command: String,

        /// Physical value
        value: f64,
    },

    /// Set the operating mode (auto, standby, party, eco)
    SetMode {
        mode: String,
    },

    /// List local serial ports
    Ports,

    /// Show client details
    Info,

    /// Show daemon reachability and binary details
    Status,

    /// Probe the daemon port
    Check,
}

/// Externally observable daemon state
#[derive(Serialize)]
struct DaemonReport {
    address: String,
    reachable: bool,
    log_file: PathBuf,
    binary: BinaryInfo,
}

/// Print a snapshot as pretty JSON
fn print_json<T: Serialize>(value: &T) -> vitolink::Result<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| vitolink::VitoError::Malformed(e.to_string()))?;
    println!("{}", json);
    Ok(())
}

fn run(args: Args) -> vitolink::Result<()> {
    let config = Config::builder()
        .mode(match args.mode {
            Mode::Serial => ConnectionMode::Serial,
            Mode::Daemon => ConnectionMode::Daemon,
        })
        .device(args.device)
        .host(args.host)
        .port(args.port)
        .timeout(Duration::from_secs(args.timeout))
        .base_dir(args.base_dir)
        .build();
    config.validate()?;

    match args.command {
        Commands::Read { command } => {
            let client = DynClient::from_config(&config);
            let value = client.read(&command)?;
            println!("{} = {}", command, value);
        }
        Commands::ReadAll => {
            let client = DynClient::from_config(&config);
            for (name, result) in client.read_all() {
                match result {
                    Ok(value) => println!("{:<16} {}", name, value),
                    Err(e) => println!("{:<16} error: {}", name, e),
                }
            }
        }
        Commands::Write { command, value } => {
            let client = DynClient::from_config(&config);
            client.write(&command, value)?;
            println!("OK");
        }
        Commands::SetMode { mode } => {
            let client = DynClient::from_config(&config);
            client.set_operating_mode(&mode)?;
            println!("OK");
        }
        Commands::Ports => {
            let ports = SerialTransport::available_ports()?;
            if ports.is_empty() {
                println!("No serial ports found");
            }
            for port in ports {
                println!("{:<20} {}", port.device, port.description);
            }
        }
        Commands::Info => {
            let client = DynClient::from_config(&config);
            // Connection failures still leave a useful snapshot
            if let Err(e) = client.connect() {
                tracing::warn!("{}", e);
            }
            print_json(&client.info())?;
        }
        Commands::Status => {
            // This process owns no daemon; report what is observable from outside
            let supervisor = Supervisor::new(config);
            print_json(&DaemonReport {
                address: supervisor.config().daemon_addr(),
                reachable: supervisor.health_check(),
                log_file: supervisor.log_file(),
                binary: supervisor.binary_info(),
            })?;
        }
        Commands::Check => {
            let supervisor = Supervisor::new(config);
            if supervisor.health_check() {
                println!("vcontrold reachable");
            } else {
                return Err(vitolink::VitoError::ConnectionRefused(supervisor.config().daemon_addr()));
            }
        }
    }

    Ok(())
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,vitolink=info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
