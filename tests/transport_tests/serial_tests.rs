//! Serial Transport Tests
//!
//! The exchange logic runs against an in-memory port; opening a real
//! device is only checked for failure handling.

use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::time::Duration;
use vitolink::protocol::{Codec, Command, FrameCodec, REPLY_LEN};
use vitolink::transport::{exchange, SerialTransport, Transport};
use vitolink::VitoError;

// =============================================================================
// Helper Types
// =============================================================================

/// Port that records writes and replays scripted reads
struct MockPort {
    written: Vec<u8>,
    /// Each chunk is returned by one read call
    chunks: VecDeque<Vec<u8>>,
    /// Writes fail with a timeout (adapter stalled)
    stalled: bool,
}

impl MockPort {
    fn new(chunks: &[&[u8]]) -> Self {
        Self {
            written: Vec::new(),
            chunks: chunks.iter().map(|c| c.to_vec()).collect(),
            stalled: false,
        }
    }
}

impl Read for MockPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.chunks.pop_front() {
            Some(chunk) => {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                if n < chunk.len() {
                    self.chunks.push_front(chunk[n..].to_vec());
                }
                Ok(n)
            }
            // Serial ports report an expired read timeout like this
            None => Err(io::Error::new(ErrorKind::TimedOut, "read timed out")),
        }
    }
}

impl Write for MockPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.stalled {
            return Err(io::Error::new(ErrorKind::TimedOut, "write timed out"));
        }
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

const TIMEOUT: Duration = Duration::from_secs(1);

// =============================================================================
// Exchange Tests
// =============================================================================

#[test]
fn test_exchange_full_reply() {
    let mut port = MockPort::new(&[&[0x06, 0x00, 0x2F, 0x00]]);
    let request = FrameCodec::new().encode("getTempKessel", None).unwrap();

    let reply = exchange(&mut port, &request, REPLY_LEN, TIMEOUT).unwrap();

    assert_eq!(port.written, vec![0x00, 0x01, 0xc1, 0xc0]);
    assert_eq!(reply, vec![0x06, 0x00, 0x2F, 0x00]);
    assert_eq!(FrameCodec::new().decode(&reply).unwrap(), 23.5);
}

#[test]
fn test_exchange_reassembles_fragments() {
    let mut port = MockPort::new(&[&[0x06], &[0x00, 0x5a], &[0x00]]);
    let reply = exchange(&mut port, &[0x00, 0x40, 0x01, 0xf0], REPLY_LEN, TIMEOUT).unwrap();
    assert_eq!(reply, vec![0x06, 0x00, 0x5a, 0x00]);
}

#[test]
fn test_exchange_reads_only_expected() {
    let mut port = MockPort::new(&[&[0x06, 0x00, 0x5a, 0x00, 0xAA, 0xBB]]);
    let reply = exchange(&mut port, &[0x00, 0x40, 0x01, 0xf0], REPLY_LEN, TIMEOUT).unwrap();

    assert_eq!(reply.len(), REPLY_LEN);
    assert_eq!(port.chunks.pop_front(), Some(vec![0xAA, 0xBB]));
}

#[test]
fn test_exchange_short_reply_is_no_response() {
    let mut port = MockPort::new(&[&[0x06, 0x00]]);
    let err = exchange(&mut port, &[0x00, 0x01, 0xc1, 0xc0], REPLY_LEN, TIMEOUT).unwrap_err();
    assert!(matches!(err, VitoError::NoResponse));
}

#[test]
fn test_exchange_silence_is_no_response() {
    let mut port = MockPort::new(&[]);
    let err = exchange(&mut port, &[0x00, 0x01, 0xc1, 0xc0], REPLY_LEN, TIMEOUT).unwrap_err();
    assert!(matches!(err, VitoError::NoResponse));
}

#[test]
fn test_exchange_write_timeout() {
    let mut port = MockPort::new(&[&[0x06, 0x00, 0x2F, 0x00]]);
    port.stalled = true;

    let err = exchange(&mut port, &[0x00, 0x01, 0xc1, 0xc0], REPLY_LEN, TIMEOUT).unwrap_err();

    assert!(matches!(err, VitoError::Timeout(_)), "got {:?}", err);
    // Nothing is read after a failed write
    assert_eq!(port.chunks.len(), 1);
}

#[test]
fn test_exchange_write_request() {
    let codec = FrameCodec::new();
    let command = Command::lookup("setTempWWsoll").unwrap();
    let mut port = MockPort::new(&[&[0x06, 0x00, 0x00, 0x00]]);

    let request = codec.encode_request(command, Some(45.0));
    let reply = exchange(&mut port, &request, codec.reply_len(command), TIMEOUT).unwrap();

    assert_eq!(port.written, vec![0x01, 0x40, 0x00, 0x5a, 0x80, 0x13]);
    assert!(codec.decode_ack(&reply).is_ok());
}

// =============================================================================
// Device Tests
// =============================================================================

#[test]
fn test_missing_device_fails() {
    let mut transport = SerialTransport::new("/dev/vitolink-missing-device", 9600, TIMEOUT);

    assert!(transport.connect().is_err());
    assert!(!transport.is_connected());

    // Lazy connect inside an exchange fails the same way
    assert!(transport.send_receive(&[0x00, 0x01, 0xc1, 0xc0], REPLY_LEN).is_err());
    assert!(!transport.is_connected());
}

#[test]
fn test_describe() {
    let transport = SerialTransport::new("/dev/ttyUSB0", 9600, TIMEOUT);
    assert_eq!(transport.describe(), "serial:/dev/ttyUSB0@9600");
    assert_eq!(transport.device(), "/dev/ttyUSB0");
}
