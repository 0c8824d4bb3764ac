//! Parsing of inbound command requests.
//!
//! A request is a JSON object:
//!
//! ```json
//! { "command": "SET_TARGET", "channel": 1, "value": 21.5 }
//! ```
//!
//! Payloads coming from message transports often arrive as a string holding
//! that object, so a JSON string is decoded once before parsing.

use serde_json::{Map, Value};
use thiserror::Error;

use fancontrol_protocol::{Command, CommandKind, ProtocolResult};

/// Reasons a request is rejected before it reaches the queue.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RequestError {
    #[error("request is not a JSON object")]
    NotAnObject,

    #[error("request has no '{0}' field")]
    MissingField(&'static str),

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("invalid '{field}': {detail}")]
    InvalidField { field: &'static str, detail: String },
}

impl RequestError {
    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            RequestError::UnknownCommand(_) => "unknown_command",
            _ => "malformed",
        }
    }
}

/// A validated request.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    pub kind: CommandKind,
    pub channel: u8,
    /// Present for write kinds only.
    pub value: Option<f64>,
    /// The request object as received, echoed in outcome events.
    pub original: Value,
}

impl CommandRequest {
    /// Parse a request from event data.
    pub fn from_value(data: &Value) -> Result<Self, RequestError> {
        match data {
            Value::Object(map) => Self::from_map(map),
            Value::String(text) => match serde_json::from_str::<Value>(text) {
                Ok(Value::Object(map)) => Self::from_map(&map),
                _ => Err(RequestError::NotAnObject),
            },
            _ => Err(RequestError::NotAnObject),
        }
    }

    fn from_map(map: &Map<String, Value>) -> Result<Self, RequestError> {
        let name = map
            .get("command")
            .ok_or(RequestError::MissingField("command"))?;
        let channel = map
            .get("channel")
            .ok_or(RequestError::MissingField("channel"))?;

        let name = name.as_str().ok_or_else(|| RequestError::InvalidField {
            field: "command",
            detail: format!("expected a string, got {name}"),
        })?;
        let kind = CommandKind::from_name(name)
            .ok_or_else(|| RequestError::UnknownCommand(name.to_string()))?;

        let channel = channel
            .as_u64()
            .and_then(|c| u8::try_from(c).ok())
            .ok_or_else(|| RequestError::InvalidField {
                field: "channel",
                detail: format!("expected an integer 0-255, got {channel}"),
            })?;

        let value = if kind.is_write() {
            let value = map.get("value").ok_or(RequestError::MissingField("value"))?;
            Some(value.as_f64().ok_or_else(|| RequestError::InvalidField {
                field: "value",
                detail: format!("expected a number, got {value}"),
            })?)
        } else {
            None
        };

        Ok(CommandRequest {
            kind,
            channel,
            value,
            original: Value::Object(map.clone()),
        })
    }

    /// Build the protocol command for this request.
    pub fn to_command(&self) -> ProtocolResult<Command> {
        Command::new(self.kind, self.channel, self.value)
    }
}
