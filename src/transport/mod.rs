//! Transport Module
//!
//! Request/response links to the controller.
//!
//! ## Variants
//! - [`SerialTransport`]: raw frames on a local serial device (8E2)
//! - [`TcpTransport`]: text lines to a vcontrold daemon
//!
//! ## Connection Handling
//! - At most one live connection per transport
//! - Connected lazily on first use
//! - Any exchange failure drops the connection; the next call reconnects
//! - No retries within a call

mod serial;
mod tcp;

pub use serial::{exchange, PortInfo, SerialTransport};
pub use tcp::TcpTransport;

use crate::error::Result;

/// Shared contract of both links
pub trait Transport: Send {
    /// Open the connection
    fn connect(&mut self) -> Result<()>;

    /// Close the connection (idempotent)
    fn disconnect(&mut self);

    /// Whether a connection is currently open
    fn is_connected(&self) -> bool;

    /// Send `request` and wait for a reply of `expected` units
    ///
    /// Units are bytes for the serial line and lines for the daemon link.
    fn send_receive(&mut self, request: &[u8], expected: usize) -> Result<Vec<u8>>;

    /// Human-readable endpoint, for logs
    fn describe(&self) -> String;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn connect(&mut self) -> Result<()> {
        (**self).connect()
    }

    fn disconnect(&mut self) {
        (**self).disconnect()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn send_receive(&mut self, request: &[u8], expected: usize) -> Result<Vec<u8>> {
        (**self).send_receive(request, expected)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
