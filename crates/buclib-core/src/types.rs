//! Core types used throughout buclib.
//!
//! [`CommandKind`] is the dispatch key for both request building and response
//! parsing. [`TransportKind`] names which physical link is currently active.

use std::fmt;
use std::str::FromStr;

/// The closed set of operations supported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Read a power module temperature in degrees Celsius.
    GetTemperature,
    /// Enable the software mute.
    MuteBUC,
    /// Disable the software mute.
    UnmuteBUC,
    /// Read the mute gate state.
    GetMuteState,
    /// Read the digital attenuator value.
    GetAttenuation,
    /// Write the digital attenuator value.
    SetAttenuation,
    /// Read the device serial number.
    GetSerialNumber,
    /// Read forward or reverse RF power in dBm.
    GetPower,
    /// Read every fault flag at once.
    GetStatusOfAllFaults,
}

impl CommandKind {
    /// Every command kind, in declaration order.
    pub const ALL: [CommandKind; 9] = [
        CommandKind::GetTemperature,
        CommandKind::MuteBUC,
        CommandKind::UnmuteBUC,
        CommandKind::GetMuteState,
        CommandKind::GetAttenuation,
        CommandKind::SetAttenuation,
        CommandKind::GetSerialNumber,
        CommandKind::GetPower,
        CommandKind::GetStatusOfAllFaults,
    ];

    /// The variant name, as used in fixture files and CLI output.
    pub fn name(&self) -> &'static str {
        match self {
            CommandKind::GetTemperature => "GetTemperature",
            CommandKind::MuteBUC => "MuteBUC",
            CommandKind::UnmuteBUC => "UnmuteBUC",
            CommandKind::GetMuteState => "GetMuteState",
            CommandKind::GetAttenuation => "GetAttenuation",
            CommandKind::SetAttenuation => "SetAttenuation",
            CommandKind::GetSerialNumber => "GetSerialNumber",
            CommandKind::GetPower => "GetPower",
            CommandKind::GetStatusOfAllFaults => "GetStatusOfAllFaults",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a string cannot be parsed into a [`CommandKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCommandKindError(String);

impl fmt::Display for ParseCommandKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown command: {}", self.0)
    }
}

impl std::error::Error for ParseCommandKindError {}

impl FromStr for CommandKind {
    type Err = ParseCommandKindError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        CommandKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| ParseCommandKindError(s.to_string()))
    }
}

/// Which physical link is currently used to reach the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransportKind {
    /// No transport selected; commands are rejected.
    #[default]
    None,
    /// TCP/IP over Ethernet.
    Network,
    /// RS-232 or USB virtual COM port.
    Serial,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::None => write!(f, "None"),
            TransportKind::Network => write!(f, "Network"),
            TransportKind::Serial => write!(f, "Serial"),
        }
    }
}

/// Direction selector for RF power readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PowerDirection {
    /// RF forward power.
    #[default]
    Forward,
    /// RF reverse (reflected) power.
    Reverse,
}

impl PowerDirection {
    /// The numeric code used on the wire (`1` forward, `2` reverse).
    pub fn code(&self) -> u8 {
        match self {
            PowerDirection::Forward => 1,
            PowerDirection::Reverse => 2,
        }
    }
}

impl fmt::Display for PowerDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerDirection::Forward => write!(f, "forward"),
            PowerDirection::Reverse => write!(f, "reverse"),
        }
    }
}

/// One delivered command result.
///
/// Broadcast to subscribers alongside every result-callback invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// The command the result belongs to.
    pub kind: CommandKind,
    /// Parsed value, device error text, or an `Error: ...` string.
    pub text: String,
}
