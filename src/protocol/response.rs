//! Frame and status definitions
//!
//! What goes on the serial line and what comes back.

use std::fmt;
use std::ops::Deref;

use bytes::Bytes;

/// Status markers leading every controller reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ack = 0x06,
    Nak = 0x15,
}

impl Status {
    /// Classify a leading reply byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x06 => Some(Status::Ack),
            0x15 => Some(Status::Nak),
            _ => None,
        }
    }
}

/// Encoded request, checksum included
#[derive(Clone, PartialEq, Eq)]
pub struct Frame(Bytes);

impl Frame {
    pub(crate) fn new(bytes: Bytes) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Trailing checksum as sent (little-endian)
    pub fn checksum(&self) -> u16 {
        let n = self.0.len();
        u16::from_le_bytes([self.0[n - 2], self.0[n - 1]])
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl Deref for Frame {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Frame({:02x?})", self.0.as_ref())
    }
}
