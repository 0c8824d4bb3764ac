//! Events carried by the bus.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event name that matches every event.
pub const WILDCARD: &str = "*";

/// A named event with a JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event name, used to route to listeners.
    pub name: String,
    /// Event payload.
    pub data: Value,
}

impl Event {
    /// Create an event.
    pub fn new(name: impl Into<String>, data: Value) -> Self {
        Event {
            name: name.into(),
            data,
        }
    }

    /// Create an event whose payload is the JSON form of `data`.
    pub fn from_serialize<T: Serialize>(
        name: impl Into<String>,
        data: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Event::new(name, serde_json::to_value(data)?))
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display() {
        let event = Event::new("controller_status", json!({"channel": 1}));
        assert_eq!(event.to_string(), r#"controller_status: {"channel":1}"#);
    }

    #[test]
    fn test_from_serialize() {
        #[derive(Serialize)]
        struct Reading {
            temp: f64,
        }
        let event = Event::from_serialize("reading", &Reading { temp: 21.5 }).unwrap();
        assert_eq!(event.data, json!({"temp": 21.5}));
    }
}
