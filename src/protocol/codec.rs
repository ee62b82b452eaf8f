//! Protocol codecs
//!
//! Two encodings of the same command set:
//! - [`FrameCodec`]: raw binary frames for the serial line
//! - [`LineCodec`]: the text line protocol spoken by vcontrold
//!
//! ## Raw Frame Format
//!
//! ### Request
//! ```text
//! ┌──────────────┬───────────────────┬──────────────┐
//! │ Opcode (2)   │ Value (2, writes) │ CRC (2, LE)  │
//! │ big-endian   │ big-endian, x2    │ over prefix  │
//! └──────────────┴───────────────────┴──────────────┘
//! ```
//!
//! ### Response
//! ```text
//! ┌──────────┬──────────────────┬────────────┐
//! │Status(1) │ Value (2, BE)    │ Unused (1) │
//! └──────────┴──────────────────┴────────────┘
//! ```
//! Status is 0x06 (ACK) or 0x15 (NAK). Values travel at 0.5 unit resolution.
//!
//! ## Daemon Line Format
//! Request `"<command>[ <value>]\n"`, reply `"OK"` optionally followed by a
//! line holding the decimal value. Any other leading token is an error.

use bytes::{BufMut, BytesMut};

use crate::error::{Result, VitoError};
use super::{Command, CommandKind, Crc16, Frame, Status};

/// Fixed length of a controller reply
pub const REPLY_LEN: usize = 4;

/// Marker opening a successful daemon reply
pub const LINE_OK: &str = "OK";

// =============================================================================
// Codec Trait
// =============================================================================

/// An encoding the cached client can drive a transport with
///
/// Reply lengths are expressed in the unit of the matching transport:
/// bytes for the serial line, lines for the daemon link.
pub trait Codec: Send + Sync {
    /// Short name for logs and info snapshots
    fn name(&self) -> &'static str;

    /// Encode a request for `command`
    fn encode_request(&self, command: &Command, value: Option<f64>) -> Vec<u8>;

    /// Expected reply length for `command`
    fn reply_len(&self, command: &Command) -> usize;

    /// Decode the reply to a read
    fn decode_reading(&self, reply: &[u8]) -> Result<f64>;

    /// Decode the reply to a write
    fn decode_ack(&self, reply: &[u8]) -> Result<()>;
}

impl<C: Codec + ?Sized> Codec for Box<C> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn encode_request(&self, command: &Command, value: Option<f64>) -> Vec<u8> {
        (**self).encode_request(command, value)
    }

    fn reply_len(&self, command: &Command) -> usize {
        (**self).reply_len(command)
    }

    fn decode_reading(&self, reply: &[u8]) -> Result<f64> {
        (**self).decode_reading(reply)
    }

    fn decode_ack(&self, reply: &[u8]) -> Result<()> {
        (**self).decode_ack(reply)
    }
}

/// Encode a physical value at 0.5 resolution
///
/// Values needing more than 16 bits wrap, as the device does.
pub fn encode_value(value: f64) -> u16 {
    (value * 2.0).round() as i64 as u16
}

/// Decode a raw 16-bit field into a physical value
pub fn decode_value(raw: u16) -> f64 {
    raw as f64 / 2.0
}

// =============================================================================
// Raw Frame Codec
// =============================================================================

/// Binary codec for direct serial access
#[derive(Debug, Clone, Default)]
pub struct FrameCodec {
    crc: Crc16,
}

impl FrameCodec {
    pub fn new() -> Self {
        Self { crc: Crc16::new() }
    }

    /// Encode a command by name
    ///
    /// Format: opcode (2) [+ value (2)] + crc (2)
    pub fn encode(&self, name: &str, value: Option<f64>) -> Result<Frame> {
        let command = Command::lookup(name)?;
        Ok(self.encode_command(command, value))
    }

    /// Encode a command already resolved from the table
    pub fn encode_command(&self, command: &Command, value: Option<f64>) -> Frame {
        let mut buf = BytesMut::with_capacity(6);
        buf.put_u16(command.opcode);
        if let Some(value) = value {
            buf.put_u16(encode_value(value));
        }

        let crc = self.crc.checksum(&buf);
        buf.put_u16_le(crc);

        Frame::new(buf.freeze())
    }

    /// Decode a read reply into its physical value
    pub fn decode(&self, bytes: &[u8]) -> Result<f64> {
        match check_status(bytes)? {
            Status::Nak => Err(VitoError::Rejected("controller answered NAK".to_string())),
            Status::Ack => {
                let raw: [u8; 2] = bytes
                    .get(1..3)
                    .and_then(|field| field.try_into().ok())
                    .ok_or_else(|| VitoError::Malformed("missing value field".to_string()))?;
                Ok(decode_value(u16::from_be_bytes(raw)))
            }
        }
    }

    /// Checksum engine used for framing
    pub fn crc(&self) -> &Crc16 {
        &self.crc
    }
}

/// Validate length and leading status byte of a raw reply
fn check_status(bytes: &[u8]) -> Result<Status> {
    if bytes.len() < REPLY_LEN {
        return Err(VitoError::Malformed(format!(
            "Incomplete reply: expected {} bytes, got {}",
            REPLY_LEN,
            bytes.len()
        )));
    }

    Status::from_byte(bytes[0]).ok_or_else(|| {
        VitoError::Malformed(format!("Unknown reply status: 0x{:02x}", bytes[0]))
    })
}

impl Codec for FrameCodec {
    fn name(&self) -> &'static str {
        "frame"
    }

    fn encode_request(&self, command: &Command, value: Option<f64>) -> Vec<u8> {
        self.encode_command(command, value).into_bytes().to_vec()
    }

    fn reply_len(&self, _command: &Command) -> usize {
        REPLY_LEN
    }

    fn decode_reading(&self, reply: &[u8]) -> Result<f64> {
        self.decode(reply)
    }

    fn decode_ack(&self, reply: &[u8]) -> Result<()> {
        match check_status(reply)? {
            Status::Ack => Ok(()),
            Status::Nak => Err(VitoError::Rejected("controller answered NAK".to_string())),
        }
    }
}

// =============================================================================
// Daemon Line Codec
// =============================================================================

/// Text codec for the vcontrold TCP interface
#[derive(Debug, Clone, Copy, Default)]
pub struct LineCodec;

impl LineCodec {
    /// Request line for a command, newline included
    pub fn encode_line(command: &Command, value: Option<f64>) -> String {
        match value {
            Some(value) => format!("{} {}\n", command.name, value),
            None => format!("{}\n", command.name),
        }
    }

    /// Split a reply into its status line and the remainder
    fn split(reply: &[u8]) -> Result<(String, Option<String>)> {
        let text = std::str::from_utf8(reply)
            .map_err(|_| VitoError::Malformed("reply is not valid UTF-8".to_string()))?;
        let mut lines = text.lines().map(str::trim).filter(|line| !line.is_empty());

        let status = lines
            .next()
            .ok_or_else(|| VitoError::Malformed("empty reply".to_string()))?;
        if !status.starts_with(LINE_OK) {
            return Err(VitoError::Rejected(status.to_string()));
        }

        Ok((status.to_string(), lines.next().map(str::to_string)))
    }
}

impl Codec for LineCodec {
    fn name(&self) -> &'static str {
        "line"
    }

    fn encode_request(&self, command: &Command, value: Option<f64>) -> Vec<u8> {
        Self::encode_line(command, value).into_bytes()
    }

    fn reply_len(&self, command: &Command) -> usize {
        match command.kind {
            CommandKind::Read => 2,
            CommandKind::Write => 1,
        }
    }

    fn decode_reading(&self, reply: &[u8]) -> Result<f64> {
        let (status, value) = Self::split(reply)?;
        if status != LINE_OK {
            return Err(VitoError::Malformed(format!("unexpected status line '{}'", status)));
        }

        let value = value.ok_or_else(|| VitoError::Malformed("missing value line".to_string()))?;
        value
            .parse::<f64>()
            .map_err(|_| VitoError::Malformed(format!("cannot parse value '{}'", value)))
    }

    fn decode_ack(&self, reply: &[u8]) -> Result<()> {
        Self::split(reply).map(|_| ())
    }
}
