//! TCP Transport
//!
//! Line-oriented link to a vcontrold daemon.

use std::io::{self, BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::config::Config;
use crate::error::{Result, VitoError};
use crate::protocol::LINE_OK;
use super::Transport;

/// Open daemon connection
struct LineConnection {
    /// TCP stream reader (buffered for line reads)
    reader: BufReader<TcpStream>,

    /// TCP stream writer
    writer: BufWriter<TcpStream>,
}

/// Text line link to vcontrold
pub struct TcpTransport {
    host: String,
    port: u16,
    timeout: Duration,
    conn: Option<LineConnection>,
}

impl TcpTransport {
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
            conn: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.host, config.port, config.timeout)
    }

    fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Resolve and connect, trying each address once
    fn open_stream(&self) -> Result<TcpStream> {
        let addrs: Vec<SocketAddr> = (self.host.as_str(), self.port).to_socket_addrs()?.collect();
        if addrs.is_empty() {
            return Err(VitoError::Connection(format!("{} did not resolve", self.endpoint())));
        }

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.timeout) {
                Ok(stream) => return Ok(stream),
                Err(e) => last_err = Some(e),
            }
        }

        Err(match last_err {
            Some(e) => map_io_error(e, &self.endpoint(), "connect"),
            None => VitoError::Connection(self.endpoint()),
        })
    }

    /// Read `lines` reply lines; a first line other than OK ends the reply
    fn read_reply(reader: &mut BufReader<TcpStream>, lines: usize) -> io::Result<Vec<u8>> {
        let mut reply = Vec::new();

        for index in 0..lines.max(1) {
            let start = reply.len();
            let n = reader.read_until(b'\n', &mut reply)?;
            if n == 0 {
                if index == 0 {
                    return Err(io::Error::new(ErrorKind::UnexpectedEof, "daemon closed connection"));
                }
                break;
            }

            let line = String::from_utf8_lossy(&reply[start..]);
            if index == 0 && !line.trim_start().starts_with(LINE_OK) {
                break;
            }
        }

        Ok(reply)
    }
}

/// Map socket failures onto the transport taxonomy
fn map_io_error(err: io::Error, endpoint: &str, action: &str) -> VitoError {
    match err.kind() {
        ErrorKind::ConnectionRefused => VitoError::ConnectionRefused(endpoint.to_string()),
        // Windows uses TimedOut instead of WouldBlock
        ErrorKind::WouldBlock | ErrorKind::TimedOut => {
            VitoError::Timeout(format!("{} {}", action, endpoint))
        }
        ErrorKind::UnexpectedEof => VitoError::NoResponse,
        ErrorKind::ConnectionReset | ErrorKind::ConnectionAborted | ErrorKind::BrokenPipe => {
            VitoError::Connection(format!("{} lost: {}", endpoint, err))
        }
        _ => VitoError::Io(err),
    }
}

impl Transport for TcpTransport {
    fn connect(&mut self) -> Result<()> {
        let stream = self.open_stream().map_err(|e| {
            tracing::error!("Cannot reach vcontrold at {}: {}", self.endpoint(), e);
            e
        })?;

        // Disable Nagle's algorithm, requests are single short lines
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;

        let read_stream = stream.try_clone()?;
        self.conn = Some(LineConnection {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
        });

        tracing::debug!("Connected to vcontrold at {}", self.endpoint());
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.conn.take().is_some() {
            tracing::debug!("Disconnected from {}", self.endpoint());
        }
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn send_receive(&mut self, request: &[u8], expected: usize) -> Result<Vec<u8>> {
        if !self.is_connected() {
            self.connect()?;
        }
        let endpoint = self.endpoint();
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| VitoError::Connection(format!("{} not connected", endpoint)))?;

        let result = conn
            .writer
            .write_all(request)
            .and_then(|_| conn.writer.flush())
            .and_then(|_| Self::read_reply(&mut conn.reader, expected));

        match result {
            Ok(reply) => {
                tracing::debug!(
                    "vcontrold reply to {:?}: {:?}",
                    String::from_utf8_lossy(request).trim_end(),
                    String::from_utf8_lossy(&reply).trim_end()
                );
                Ok(reply)
            }
            Err(e) => {
                let err = map_io_error(e, &endpoint, "reply from");
                tracing::warn!("Exchange with {} failed: {}", endpoint, err);
                self.disconnect();
                Err(err)
            }
        }
    }

    fn describe(&self) -> String {
        format!("tcp:{}", self.endpoint())
    }
}
