//! Serial Transport
//!
//! Direct access to the controller's optolink adapter.

use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use serde::Serialize;
use serialport::{ClearBuffer, DataBits, Parity, SerialPort, SerialPortType, StopBits};

use crate::config::Config;
use crate::error::{Result, VitoError};
use super::Transport;

/// A serial port found on this machine
#[derive(Debug, Clone, Serialize)]
pub struct PortInfo {
    pub device: String,
    pub description: String,
}

/// Raw frame link over a local serial device
pub struct SerialTransport {
    device: String,
    baud_rate: u32,
    timeout: Duration,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialTransport {
    pub fn new(device: impl Into<String>, baud_rate: u32, timeout: Duration) -> Self {
        Self {
            device: device.into(),
            baud_rate,
            timeout,
            port: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.device, config.baud_rate, config.timeout)
    }

    /// List serial ports present on this machine
    pub fn available_ports() -> Result<Vec<PortInfo>> {
        let ports = serialport::available_ports()?;
        Ok(ports
            .into_iter()
            .map(|port| {
                let description = match port.port_type {
                    SerialPortType::UsbPort(usb) => usb
                        .product
                        .unwrap_or_else(|| format!("USB {:04x}:{:04x}", usb.vid, usb.pid)),
                    SerialPortType::PciPort => "PCI".to_string(),
                    SerialPortType::BluetoothPort => "Bluetooth".to_string(),
                    SerialPortType::Unknown => "Unknown".to_string(),
                };
                PortInfo {
                    device: port.port_name,
                    description,
                }
            })
            .collect())
    }

    pub fn device(&self) -> &str {
        &self.device
    }
}

impl Transport for SerialTransport {
    fn connect(&mut self) -> Result<()> {
        let port = serialport::new(&self.device, self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::Even)
            .stop_bits(StopBits::Two)
            .timeout(self.timeout)
            .open()
            .map_err(|e| {
                tracing::error!("Failed to open {}: {}", self.device, e);
                VitoError::from(e)
            })?;

        tracing::info!("Connected to controller on {} ({} baud)", self.device, self.baud_rate);
        self.port = Some(port);
        Ok(())
    }

    fn disconnect(&mut self) {
        if self.port.take().is_some() {
            tracing::debug!("Closed {}", self.device);
        }
    }

    fn is_connected(&self) -> bool {
        self.port.is_some()
    }

    fn send_receive(&mut self, request: &[u8], expected: usize) -> Result<Vec<u8>> {
        if !self.is_connected() {
            self.connect()?;
        }
        let timeout = self.timeout;
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| VitoError::Serial("port not open".to_string()))?;

        // Stale bytes from an unanswered exchange would shift the fixed-length reply
        let result = port
            .clear(ClearBuffer::All)
            .map_err(VitoError::from)
            .and_then(|_| exchange(port.as_mut(), request, expected, timeout));

        match result {
            Ok(reply) => {
                tracing::debug!("Reply from {}: {:02x?}", self.device, reply);
                Ok(reply)
            }
            Err(e) => {
                tracing::warn!("Exchange on {} failed: {}", self.device, e);
                self.disconnect();
                Err(e)
            }
        }
    }

    fn describe(&self) -> String {
        format!("serial:{}@{}", self.device, self.baud_rate)
    }
}

/// Write `request` and read exactly `expected` bytes within `timeout`
///
/// A short or empty read is [`VitoError::NoResponse`], never a partial reply.
pub fn exchange<P: Read + Write + ?Sized>(
    port: &mut P,
    request: &[u8],
    expected: usize,
    timeout: Duration,
) -> Result<Vec<u8>> {
    port.write_all(request)
        .and_then(|_| port.flush())
        .map_err(|e| match e.kind() {
            ErrorKind::TimedOut | ErrorKind::WouldBlock => {
                VitoError::Timeout("write to serial port".to_string())
            }
            _ => VitoError::Io(e),
        })?;

    let deadline = Instant::now() + timeout;
    let mut reply = vec![0u8; expected];
    let mut filled = 0;

    while filled < expected && Instant::now() < deadline {
        match port.read(&mut reply[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::WouldBlock => break,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    if filled < expected {
        tracing::warn!("Short reply: expected {} bytes, got {}", expected, filled);
        return Err(VitoError::NoResponse);
    }

    Ok(reply)
}
