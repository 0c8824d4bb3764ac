//! Outcome events published by the communicator.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use fancontrol_bus::Event;

/// Event name for command outcomes.
pub const EVENT_COMMAND_RESULTS: &str = "controller_command_results";

/// Whether a command completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeType {
    Success,
    Error,
}

/// Summary published when a command reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOutcome {
    #[serde(rename = "type")]
    pub kind: OutcomeType,
    pub message: String,
    /// The request that produced the command.
    pub original_command: Value,
}

impl CommandOutcome {
    pub fn success(message: impl Into<String>, original_command: Value) -> Self {
        CommandOutcome {
            kind: OutcomeType::Success,
            message: message.into(),
            original_command,
        }
    }

    pub fn error(message: impl Into<String>, original_command: Value) -> Self {
        CommandOutcome {
            kind: OutcomeType::Error,
            message: message.into(),
            original_command,
        }
    }

    /// Wrap as a bus event.
    pub fn to_event(&self) -> Event {
        let data = serde_json::json!({
            "type": self.kind,
            "message": self.message,
            "original_command": self.original_command,
        });
        Event::new(EVENT_COMMAND_RESULTS, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_shape() {
        let outcome = CommandOutcome::error("timeout", json!({"command": "GET_STATUS"}));
        let event = outcome.to_event();
        assert_eq!(event.name, "controller_command_results");
        assert_eq!(
            event.data,
            json!({
                "type": "error",
                "message": "timeout",
                "original_command": {"command": "GET_STATUS"}
            })
        );
        let back: CommandOutcome = serde_json::from_value(event.data).unwrap();
        assert_eq!(back, outcome);
    }
}
