//! Error types for vitolink
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using VitoError
pub type Result<T> = std::result::Result<T, VitoError>;

/// Unified error type for vitolink operations
#[derive(Debug, Error)]
pub enum VitoError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("Command {command} cannot be used for a {expected}")]
    InvalidCommand {
        command: String,
        expected: &'static str,
    },

    #[error("Unknown operating mode: {0}")]
    UnknownMode(String),

    #[error("Value {value} out of range for {command} ({min}..={max})")]
    OutOfRange {
        command: String,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    // -------------------------------------------------------------------------
    // Transport Errors
    // -------------------------------------------------------------------------
    #[error("No response from controller")]
    NoResponse,

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Connection refused by {0}")]
    ConnectionRefused(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Serial port error: {0}")]
    Serial(String),

    // -------------------------------------------------------------------------
    // Supervisor Errors
    // -------------------------------------------------------------------------
    #[error("Daemon binary not found: {}", .0.display())]
    BinaryMissing(PathBuf),

    #[error("Cannot prepare directory {}: {source}", path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Daemon exited during startup (exit code: {code:?})")]
    ProcessExitedEarly { code: Option<i32> },

    #[error("Process control error: {0}")]
    Process(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serialport::Error> for VitoError {
    fn from(err: serialport::Error) -> Self {
        match err.kind() {
            serialport::ErrorKind::Io(kind) => VitoError::Io(std::io::Error::new(kind, err.description)),
            _ => VitoError::Serial(err.description),
        }
    }
}
