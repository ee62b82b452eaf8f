//! Configuration for vitolink
//!
//! Centralized configuration with sensible defaults.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Result, VitoError};
use crate::supervisor::Platform;

/// Lowest TCP port accepted for the daemon
pub const MIN_PORT: u16 = 1024;

/// Accepted polling interval range for the host scheduler
pub const MIN_UPDATE_INTERVAL: Duration = Duration::from_secs(30);
pub const MAX_UPDATE_INTERVAL: Duration = Duration::from_secs(300);

/// Main configuration for a vitolink instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Connection Configuration
    // -------------------------------------------------------------------------
    /// Which link the client drives
    pub mode: ConnectionMode,

    /// Serial device of the optolink adapter (also passed to the daemon)
    pub device: String,

    /// Serial baud rate
    pub baud_rate: u32,

    /// Daemon listen host
    pub host: String,

    /// Daemon listen port
    pub port: u16,

    /// Read/write timeout for a single exchange
    pub timeout: Duration,

    // -------------------------------------------------------------------------
    // Client Configuration
    // -------------------------------------------------------------------------
    /// How long a successful read stays valid
    pub cache_ttl: Duration,

    /// Polling interval of the host scheduler
    pub update_interval: Duration,

    // -------------------------------------------------------------------------
    // Supervisor Configuration
    // -------------------------------------------------------------------------
    /// Working directory of the daemon
    /// Internal structure:
    ///   {base_dir}/
    ///     ├── vcontrold[.exe]  (daemon binary)
    ///     └── vcontrold.log    (daemon stdout/stderr, appended)
    pub base_dir: PathBuf,

    /// Verbosity passed to the daemon
    pub log_level: DaemonLogLevel,

    /// Wait after launch before checking for an early exit
    pub grace_period: Duration,

    /// Wait after the graceful signal before killing
    pub stop_timeout: Duration,

    /// Connect timeout of the TCP health probe
    pub health_check_timeout: Duration,
}

/// Link used by the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Raw frames on the local serial device
    Serial,

    /// Text lines to a vcontrold daemon over TCP
    Daemon,
}

impl FromStr for ConnectionMode {
    type Err = VitoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "serial" => Ok(ConnectionMode::Serial),
            "daemon" | "tcp" => Ok(ConnectionMode::Daemon),
            other => Err(VitoError::Config(format!("unknown connection mode '{}'", other))),
        }
    }
}

/// Daemon log verbosity (`--loglevel`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonLogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl DaemonLogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            DaemonLogLevel::Error => "ERROR",
            DaemonLogLevel::Warn => "WARN",
            DaemonLogLevel::Info => "INFO",
            DaemonLogLevel::Debug => "DEBUG",
        }
    }
}

impl fmt::Display for DaemonLogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DaemonLogLevel {
    type Err = VitoError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ERROR" => Ok(DaemonLogLevel::Error),
            "WARN" | "WARNING" => Ok(DaemonLogLevel::Warn),
            "INFO" => Ok(DaemonLogLevel::Info),
            "DEBUG" => Ok(DaemonLogLevel::Debug),
            other => Err(VitoError::Config(format!("unknown log level '{}'", other))),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mode: ConnectionMode::Daemon,
            device: "/dev/ttyUSB0".to_string(),
            baud_rate: 9600,
            host: "localhost".to_string(),
            port: 3002,
            timeout: Duration::from_secs(10),
            cache_ttl: Duration::from_secs(30),
            update_interval: Duration::from_secs(60),
            base_dir: PathBuf::from("./vcontrold_daemon"),
            log_level: DaemonLogLevel::Error,
            grace_period: Duration::from_secs(2),
            stop_timeout: Duration::from_secs(5),
            health_check_timeout: Duration::from_secs(5),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Expected location of the daemon binary for the running platform
    pub fn binary_path(&self) -> PathBuf {
        self.base_dir.join(Platform::current().binary_name())
    }

    /// Daemon log file (opened in append mode)
    pub fn log_file(&self) -> PathBuf {
        self.base_dir.join("vcontrold.log")
    }

    /// `host:port` of the daemon
    pub fn daemon_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check the configuration for values the controller or daemon cannot use
    pub fn validate(&self) -> Result<()> {
        if self.device.trim().is_empty() {
            return Err(VitoError::Config("serial device must not be empty".into()));
        }
        if self.host.trim().is_empty() {
            return Err(VitoError::Config("daemon host must not be empty".into()));
        }
        if self.port < MIN_PORT {
            return Err(VitoError::Config(format!(
                "port {} outside {}..=65535",
                self.port, MIN_PORT
            )));
        }
        if self.baud_rate == 0 {
            return Err(VitoError::Config("baud rate must be positive".into()));
        }
        if self.timeout.is_zero() || self.health_check_timeout.is_zero() {
            return Err(VitoError::Config("timeouts must be positive".into()));
        }
        if self.cache_ttl.is_zero() {
            return Err(VitoError::Config("cache TTL must be positive".into()));
        }
        if self.update_interval < MIN_UPDATE_INTERVAL || self.update_interval > MAX_UPDATE_INTERVAL {
            return Err(VitoError::Config(format!(
                "update interval {}s outside {}..={}s",
                self.update_interval.as_secs(),
                MIN_UPDATE_INTERVAL.as_secs(),
                MAX_UPDATE_INTERVAL.as_secs()
            )));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Select serial or daemon mode
    pub fn mode(mut self, mode: ConnectionMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Set the serial device path
    pub fn device(mut self, device: impl Into<String>) -> Self {
        self.config.device = device.into();
        self
    }

    /// Set the serial baud rate
    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.config.baud_rate = baud;
        self
    }

    /// Set the daemon host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the daemon port
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the exchange timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the read cache TTL
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache_ttl = ttl;
        self
    }

    /// Set the host polling interval
    pub fn update_interval(mut self, interval: Duration) -> Self {
        self.config.update_interval = interval;
        self
    }

    /// Set the daemon working directory
    pub fn base_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.base_dir = path.into();
        self
    }

    /// Set the daemon log level
    pub fn log_level(mut self, level: DaemonLogLevel) -> Self {
        self.config.log_level = level;
        self
    }

    /// Set the startup grace period
    pub fn grace_period(mut self, period: Duration) -> Self {
        self.config.grace_period = period;
        self
    }

    /// Set the graceful stop timeout
    pub fn stop_timeout(mut self, timeout: Duration) -> Self {
        self.config.stop_timeout = timeout;
        self
    }

    /// Set the health probe connect timeout
    pub fn health_check_timeout(mut self, timeout: Duration) -> Self {
        self.config.health_check_timeout = timeout;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
