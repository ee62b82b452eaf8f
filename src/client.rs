//! Cached Client
//!
//! Issues reads and writes through one transport and caches readings.
//!
//! ## Concurrency Model
//!
//! - **Exchanges**: serialized by the `link` mutex. A request and its reply
//!   never interleave with another request on the same connection.
//! - **Cache**: internal RwLock. Fresh hits are served without touching
//!   the link at all.
//! - Cache stores and invalidations happen while the link is held, so a read
//!   cannot re-insert a value older than a write that already returned.

use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;

use crate::cache::ReadCache;
use crate::config::{Config, ConnectionMode};
use crate::error::{Result, VitoError};
use crate::protocol::{Codec, Command, FrameCodec, LineCodec, OperatingMode};
use crate::transport::{SerialTransport, TcpTransport, Transport};

/// Client speaking raw frames on a serial line
pub type SerialClient = CachedClient<SerialTransport, FrameCodec>;

/// Client speaking the vcontrold line protocol
pub type DaemonClient = CachedClient<TcpTransport, LineCodec>;

/// Client whose link is picked at runtime
pub type DynClient = CachedClient<Box<dyn Transport>, Box<dyn Codec>>;

/// Observability snapshot of a client
#[derive(Debug, Clone, Serialize)]
pub struct ClientInfo {
    pub transport: String,
    pub codec: &'static str,
    pub connected: bool,
    pub cache_size: usize,
    pub cache_ttl_secs: f64,
}

/// Read/write client with a TTL read cache
pub struct CachedClient<T: Transport, C: Codec> {
    /// The single link (exclusive access per exchange)
    link: Mutex<T>,

    /// Encoding matching the link
    codec: C,

    /// Recent readings
    cache: ReadCache,
}

impl SerialClient {
    /// Direct serial access with raw frames
    pub fn serial(config: &Config) -> Self {
        Self::new(SerialTransport::from_config(config), FrameCodec::new(), config.cache_ttl)
    }
}

impl DaemonClient {
    /// Access through a vcontrold daemon
    pub fn daemon(config: &Config) -> Self {
        Self::new(TcpTransport::from_config(config), LineCodec, config.cache_ttl)
    }
}

impl DynClient {
    /// Pick the link from `config.mode`
    pub fn from_config(config: &Config) -> Self {
        match config.mode {
            ConnectionMode::Serial => Self::new(
                Box::new(SerialTransport::from_config(config)),
                Box::new(FrameCodec::new()),
                config.cache_ttl,
            ),
            ConnectionMode::Daemon => Self::new(
                Box::new(TcpTransport::from_config(config)),
                Box::new(LineCodec),
                config.cache_ttl,
            ),
        }
    }
}

impl<T: Transport, C: Codec> CachedClient<T, C> {
    pub fn new(transport: T, codec: C, cache_ttl: Duration) -> Self {
        Self {
            link: Mutex::new(transport),
            codec,
            cache: ReadCache::new(cache_ttl),
        }
    }

    /// Read a value, from cache when fresh
    ///
    /// Failures are returned as-is; a stale entry is never served instead.
    pub fn read(&self, name: &str) -> Result<f64> {
        let command = Command::lookup(name)?;
        if !command.is_read() {
            return Err(VitoError::InvalidCommand {
                command: name.to_string(),
                expected: "read",
            });
        }

        if let Some(value) = self.cache.get(command.name) {
            tracing::trace!("{} served from cache: {}", command.name, value);
            return Ok(value);
        }

        let mut link = self.link.lock();

        // Refreshed by another caller while we waited for the link
        if let Some(value) = self.cache.get(command.name) {
            return Ok(value);
        }

        let request = self.codec.encode_request(command, None);
        let value = link
            .send_receive(&request, self.codec.reply_len(command))
            .and_then(|reply| self.codec.decode_reading(&reply))
            .map_err(|e| {
                tracing::warn!("Reading {} failed: {}", command.name, e);
                e
            })?;

        self.cache.insert(command.name, value);
        tracing::debug!("{}: {}", command.name, value);
        Ok(value)
    }

    /// Read every read command in the table
    pub fn read_all(&self) -> Vec<(&'static str, Result<f64>)> {
        Command::reads().map(|cmd| (cmd.name, self.read(cmd.name))).collect()
    }

    /// Write a value
    ///
    /// The value is checked against the command's range before any I/O. On
    /// acknowledgement the paired read is dropped from the cache.
    pub fn write(&self, name: &str, value: f64) -> Result<()> {
        let command = Command::lookup(name)?;
        if !command.is_write() {
            return Err(VitoError::InvalidCommand {
                command: name.to_string(),
                expected: "write",
            });
        }

        if let Some(range) = command.range {
            if !range.contains(value) {
                tracing::error!("{} {} outside {}..={}", name, value, range.min, range.max);
                return Err(VitoError::OutOfRange {
                    command: name.to_string(),
                    value,
                    min: range.min,
                    max: range.max,
                });
            }
        }

        let mut link = self.link.lock();

        let request = self.codec.encode_request(command, Some(value));
        link.send_receive(&request, self.codec.reply_len(command))
            .and_then(|reply| self.codec.decode_ack(&reply))
            .map_err(|e| {
                tracing::error!("{} {} failed: {}", command.name, value, e);
                e
            })?;

        if let Some(key) = command.paired_read() {
            self.cache.invalidate(&key);
        }

        tracing::info!("{} set to {}", command.name, value);
        Ok(())
    }

    /// Switch the operating mode by name (`auto`, `standby`, `party`, `eco`)
    pub fn set_operating_mode(&self, mode: &str) -> Result<()> {
        let mode: OperatingMode = mode.parse().map_err(|e| {
            tracing::error!("{}", e);
            e
        })?;
        self.set_mode(mode)
    }

    /// Switch the operating mode
    pub fn set_mode(&self, mode: OperatingMode) -> Result<()> {
        self.write(OperatingMode::COMMAND, mode.code())?;
        tracing::info!("Operating mode set to {}", mode);
        Ok(())
    }

    /// Open the link ahead of the first request
    pub fn connect(&self) -> Result<()> {
        self.link.lock().connect()
    }

    /// Close the link; the next request reconnects
    pub fn close(&self) {
        self.link.lock().disconnect();
    }

    pub fn is_connected(&self) -> bool {
        self.link.lock().is_connected()
    }

    /// Cached value regardless of I/O, if still fresh
    pub fn cached(&self, name: &str) -> Option<f64> {
        self.cache.get(name)
    }

    pub fn cache(&self) -> &ReadCache {
        &self.cache
    }

    pub fn info(&self) -> ClientInfo {
        let link = self.link.lock();
        ClientInfo {
            transport: link.describe(),
            codec: self.codec.name(),
            connected: link.is_connected(),
            cache_size: self.cache.len(),
            cache_ttl_secs: self.cache.ttl().as_secs_f64(),
        }
    }
}
