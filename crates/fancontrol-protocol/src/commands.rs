//! Commands that can be sent to the controller firmware.
//!
//! Each command kind is described by a row in a static table: its wire
//! opcode, the shape of its payload and the fixed-point scale applied to the
//! payload value.

use serde::{Deserialize, Serialize};

use crate::constants::*;
use crate::error::{ProtocolError, ProtocolResult};
use crate::responses::CommandResult;

/// Payload shape of a command.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Payload {
    /// Host sends one byte holding `value * scale`.
    U8 {
        /// Fixed-point multiplier.
        scale: f64,
    },
    /// Host sends an unsigned 16-bit field holding `value * scale`.
    U16 {
        /// Fixed-point multiplier.
        scale: f64,
    },
    /// Device replies with four biased fields: temp, target, speed, output.
    Status,
    /// Device replies with four unsigned fields: mode, kp, ki, kd.
    Settings,
}

/// Static description of one command kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CommandSpec {
    /// Name used in inbound requests.
    pub name: &'static str,
    /// Wire opcode.
    pub opcode: u8,
    /// Payload shape.
    pub payload: Payload,
}

/// Kinds of command understood by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandKind {
    /// Set the target temperature (°C, one decimal).
    SetTarget,
    /// Set the manual output (0-255).
    SetOutput,
    /// Set the proportional gain (two decimals).
    SetKp,
    /// Set the integral gain (two decimals).
    SetKi,
    /// Set the derivative gain (two decimals).
    SetKd,
    /// Set the control mode.
    SetMode,
    /// Read the live status of a channel.
    GetStatus,
    /// Read the configured settings of a channel.
    GetSettings,
}

const COMMAND_TABLE: [CommandSpec; 8] = [
    CommandSpec {
        name: "SET_TARGET",
        opcode: CMD_SET_TARGET,
        payload: Payload::U16 { scale: 10.0 },
    },
    CommandSpec {
        name: "SET_OUTPUT",
        opcode: CMD_SET_OUTPUT,
        payload: Payload::U8 { scale: 1.0 },
    },
    CommandSpec {
        name: "SET_KP",
        opcode: CMD_SET_KP,
        payload: Payload::U16 { scale: 100.0 },
    },
    CommandSpec {
        name: "SET_KI",
        opcode: CMD_SET_KI,
        payload: Payload::U16 { scale: 100.0 },
    },
    CommandSpec {
        name: "SET_KD",
        opcode: CMD_SET_KD,
        payload: Payload::U16 { scale: 100.0 },
    },
    CommandSpec {
        name: "SET_MODE",
        opcode: CMD_SET_MODE,
        payload: Payload::U8 { scale: 1.0 },
    },
    CommandSpec {
        name: "GET_STATUS",
        opcode: CMD_GET_STATUS,
        payload: Payload::Status,
    },
    CommandSpec {
        name: "GET_SETTINGS",
        opcode: CMD_GET_SETTINGS,
        payload: Payload::Settings,
    },
];

impl CommandKind {
    /// All command kinds, in opcode order.
    pub const ALL: [CommandKind; 8] = [
        CommandKind::SetTarget,
        CommandKind::SetOutput,
        CommandKind::SetKp,
        CommandKind::SetKi,
        CommandKind::SetKd,
        CommandKind::SetMode,
        CommandKind::GetStatus,
        CommandKind::GetSettings,
    ];

    /// Table row for this kind.
    pub fn spec(self) -> &'static CommandSpec {
        &COMMAND_TABLE[self as usize]
    }

    /// Request name, e.g. `"SET_TARGET"`.
    pub fn name(self) -> &'static str {
        self.spec().name
    }

    /// Wire opcode.
    pub fn opcode(self) -> u8 {
        self.spec().opcode
    }

    /// Look up a kind by its request name. Names are case-sensitive.
    pub fn from_name(name: &str) -> Option<CommandKind> {
        Self::ALL.iter().copied().find(|kind| kind.name() == name)
    }

    /// Whether the host sends a value to the device.
    pub fn is_write(self) -> bool {
        matches!(self.spec().payload, Payload::U8 { .. } | Payload::U16 { .. })
    }

    /// Scale `value` to the wire representation, truncating toward zero.
    ///
    /// Returns the encoded field as `u16`; byte-wide payloads are guaranteed
    /// to fit in a `u8`.
    pub fn encode_value(self, value: f64) -> ProtocolResult<u16> {
        let (scale, max) = match self.spec().payload {
            Payload::U8 { scale } => (scale, u8::MAX as f64),
            Payload::U16 { scale } => (scale, u16::MAX as f64),
            Payload::Status | Payload::Settings => {
                return Err(ProtocolError::MalformedInput(format!(
                    "{} takes no value",
                    self.name()
                )))
            }
        };
        if !value.is_finite() {
            return Err(ProtocolError::MalformedInput(format!(
                "{} value {value} is not a finite number",
                self.name()
            )));
        }
        let scaled = (value * scale).trunc();
        if scaled < 0.0 || scaled > max {
            return Err(ProtocolError::MalformedInput(format!(
                "{} value {value} does not fit the wire field",
                self.name()
            )));
        }
        Ok(scaled as u16)
    }
}

impl std::fmt::Display for CommandKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Retry limits applied by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts before a command is abandoned.
    pub max_tries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_tries: 3 }
    }
}

impl RetryPolicy {
    /// Whether a command that has failed `tries` times should be dropped.
    pub fn exhausted(&self, tries: u32) -> bool {
        tries >= self.max_tries
    }
}

/// A single device operation with its retry state.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    kind: CommandKind,
    channel: u8,
    value: Option<f64>,
    tries: u32,
    result: Option<CommandResult>,
}

impl Command {
    /// Create a command. Write kinds require a value; read kinds ignore it.
    pub fn new(kind: CommandKind, channel: u8, value: Option<f64>) -> ProtocolResult<Self> {
        let value = if kind.is_write() {
            match value {
                Some(v) => Some(v),
                None => {
                    return Err(ProtocolError::MalformedInput(format!(
                        "{kind} requires a value"
                    )))
                }
            }
        } else {
            None
        };
        Ok(Command {
            kind,
            channel,
            value,
            tries: 0,
            result: None,
        })
    }

    /// Command kind.
    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    /// Target channel.
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Payload value for write kinds.
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    /// Number of failed attempts.
    pub fn tries(&self) -> u32 {
        self.tries
    }

    /// Record a failed attempt and return the new count.
    pub fn increment_tries(&mut self) -> u32 {
        self.tries += 1;
        self.tries
    }

    /// Result of a successful read-style execution.
    pub fn result(&self) -> Option<&CommandResult> {
        self.result.as_ref()
    }

    /// Take the result out of the command.
    pub fn take_result(&mut self) -> Option<CommandResult> {
        self.result.take()
    }

    pub(crate) fn set_result(&mut self, result: CommandResult) {
        self.result = Some(result);
    }
}
