//! Command definitions
//!
//! The fixed command table of the Vitotronic family and the operating modes
//! accepted by `setBetriebsart`.

use std::fmt;
use std::str::FromStr;

use crate::error::{Result, VitoError};

/// Direction of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Query a value; no payload
    Read,

    /// Set a value; carries a 2-byte payload
    Write,
}

/// Inclusive range of physical values a write command accepts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,

    /// Only whole numbers are valid (enumerated codes)
    pub integral: bool,
}

impl ValueRange {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max && (!self.integral || value.fract() == 0.0)
    }
}

/// Temperature set points (°C)
pub const TEMPERATURE_RANGE: ValueRange = ValueRange { min: 20.0, max: 80.0, integral: false };

/// Operating mode codes
pub const MODE_RANGE: ValueRange = ValueRange { min: 0.0, max: 3.0, integral: true };

/// An entry of the command table
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Command {
    /// Symbolic name, as understood by vcontrold
    pub name: &'static str,

    /// 2-byte opcode sent on the serial line
    pub opcode: u16,

    pub kind: CommandKind,

    /// Accepted values (write commands only)
    pub range: Option<ValueRange>,
}

const fn read(name: &'static str, opcode: u16) -> Command {
    Command { name, opcode, kind: CommandKind::Read, range: None }
}

const fn write(name: &'static str, opcode: u16, range: ValueRange) -> Command {
    Command { name, opcode, kind: CommandKind::Write, range: Some(range) }
}

/// The closed command table
pub const COMMANDS: &[Command] = &[
    read("getTempKessel", 0x0001),
    read("getTempAussen", 0x000d),
    read("getTempWWsoll", 0x0040),
    read("getTempWWist", 0x0041),
    read("getTempVorlaufHK1", 0x0002),
    write("setTempWWsoll", 0x0140, TEMPERATURE_RANGE),
    write("setBetriebsart", 0x0120, MODE_RANGE),
];

impl Command {
    /// Look up a command by its symbolic name
    pub fn lookup(name: &str) -> Result<&'static Command> {
        COMMANDS
            .iter()
            .find(|cmd| cmd.name == name)
            .ok_or_else(|| VitoError::UnknownCommand(name.to_string()))
    }

    /// All read commands, in table order
    pub fn reads() -> impl Iterator<Item = &'static Command> {
        COMMANDS.iter().filter(|cmd| cmd.kind == CommandKind::Read)
    }

    pub fn is_read(&self) -> bool {
        self.kind == CommandKind::Read
    }

    pub fn is_write(&self) -> bool {
        self.kind == CommandKind::Write
    }

    /// Opcode in wire order
    pub fn opcode_bytes(&self) -> [u8; 2] {
        self.opcode.to_be_bytes()
    }

    /// Cache key of the read command a write affects
    ///
    /// `setTempWWsoll` pairs with `getTempWWsoll`. Read commands have no pair.
    pub fn paired_read(&self) -> Option<String> {
        match self.kind {
            CommandKind::Write => self.name.strip_prefix("set").map(|rest| format!("get{}", rest)),
            CommandKind::Read => None,
        }
    }
}

/// Operating modes of `setBetriebsart`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatingMode {
    Auto = 0,
    Standby = 1,
    Party = 2,
    Eco = 3,
}

impl OperatingMode {
    /// Command that carries the mode
    pub const COMMAND: &'static str = "setBetriebsart";

    pub const ALL: [OperatingMode; 4] = [
        OperatingMode::Auto,
        OperatingMode::Standby,
        OperatingMode::Party,
        OperatingMode::Eco,
    ];

    /// Numeric encoding sent with `setBetriebsart`
    pub fn code(&self) -> f64 {
        *self as u8 as f64
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OperatingMode::Auto => "auto",
            OperatingMode::Standby => "standby",
            OperatingMode::Party => "party",
            OperatingMode::Eco => "eco",
        }
    }
}

impl fmt::Display for OperatingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperatingMode {
    type Err = VitoError;

    fn from_str(s: &str) -> Result<Self> {
        OperatingMode::ALL
            .into_iter()
            .find(|mode| mode.as_str() == s)
            .ok_or_else(|| VitoError::UnknownMode(s.to_string()))
    }
}
