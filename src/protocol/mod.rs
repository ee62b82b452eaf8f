//! Protocol Module
//!
//! Wire protocol of the Vitotronic heating controllers.
//!
//! ## Commands
//! - Reads:  getTempKessel (0x0001), getTempAussen (0x000d),
//!           getTempWWsoll (0x0040), getTempWWist (0x0041),
//!           getTempVorlaufHK1 (0x0002)
//! - Writes: setTempWWsoll (0x0140), setBetriebsart (0x0120)
//!
//! ### Status Codes
//! - 0x06: ACK
//! - 0x15: NAK
//!
//! The codec performs no I/O and holds no mutable state.

mod crc;
mod command;
mod response;
mod codec;

pub use crc::{Crc16, POLYNOMIAL};
pub use command::{
    Command, CommandKind, OperatingMode, ValueRange, COMMANDS, MODE_RANGE, TEMPERATURE_RANGE,
};
pub use response::{Frame, Status};
pub use codec::{decode_value, encode_value, Codec, FrameCodec, LineCodec, LINE_OK, REPLY_LEN};
