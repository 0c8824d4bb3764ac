//! Results reported by read-style commands.

use serde::{Deserialize, Serialize};

/// Event name carrying a [`ControllerStatus`].
pub const EVENT_CONTROLLER_STATUS: &str = "controller_status";
/// Event name carrying a [`ControllerSettings`].
pub const EVENT_CONTROLLER_SETTINGS: &str = "controller_settings";

/// Live readings of one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerStatus {
    /// Channel the readings belong to.
    pub channel: u8,
    /// Measured temperature in °C.
    pub temp: f64,
    /// Target temperature in °C.
    pub target: f64,
    /// Fan speed in RPM.
    pub speed: i16,
    /// Current output (PWM duty).
    pub output: i16,
}

impl ControllerStatus {
    /// Build from the four decoded wire fields.
    pub fn from_fields(channel: u8, fields: [i16; 4]) -> Self {
        ControllerStatus {
            channel,
            temp: fields[0] as f64 / 10.0,
            target: fields[1] as f64 / 10.0,
            speed: fields[2],
            output: fields[3],
        }
    }
}

/// Configured settings of one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerSettings {
    /// Channel the settings belong to.
    pub channel: u8,
    /// Control mode.
    pub mode: u16,
    /// Proportional gain.
    pub kp: f64,
    /// Integral gain.
    pub ki: f64,
    /// Derivative gain.
    pub kd: f64,
}

impl ControllerSettings {
    /// Build from the four raw wire fields.
    pub fn from_fields(channel: u8, fields: [u16; 4]) -> Self {
        ControllerSettings {
            channel,
            mode: fields[0],
            kp: fields[1] as f64 / 100.0,
            ki: fields[2] as f64 / 100.0,
            kd: fields[3] as f64 / 100.0,
        }
    }
}

/// Data produced by a successful read-style command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandResult {
    /// Reply to GET_STATUS.
    Status(ControllerStatus),
    /// Reply to GET_SETTINGS.
    Settings(ControllerSettings),
}

impl CommandResult {
    /// Name of the event that reports this result.
    pub fn event_name(&self) -> &'static str {
        match self {
            CommandResult::Status(_) => EVENT_CONTROLLER_STATUS,
            CommandResult::Settings(_) => EVENT_CONTROLLER_SETTINGS,
        }
    }

    /// Channel the result belongs to.
    pub fn channel(&self) -> u8 {
        match self {
            CommandResult::Status(s) => s.channel,
            CommandResult::Settings(s) => s.channel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_scaling() {
        let status = ControllerStatus::from_fields(2, [300, 315, 7500, 42]);
        assert_eq!(status.temp, 30.0);
        assert_eq!(status.target, 31.5);
        assert_eq!(status.speed, 7500);
        assert_eq!(status.output, 42);
    }

    #[test]
    fn test_negative_temperature() {
        let status = ControllerStatus::from_fields(0, [-55, 0, 0, 0]);
        assert_eq!(status.temp, -5.5);
    }

    #[test]
    fn test_settings_scaling() {
        let settings = ControllerSettings::from_fields(1, [2, 315, 7500, 42]);
        assert_eq!(settings.mode, 2);
        assert_eq!(settings.kp, 3.15);
        assert_eq!(settings.ki, 75.0);
        assert_eq!(settings.kd, 0.42);
    }

    #[test]
    fn test_event_names() {
        let status = CommandResult::Status(ControllerStatus::from_fields(3, [0; 4]));
        assert_eq!(status.event_name(), "controller_status");
        assert_eq!(status.channel(), 3);
        let settings = CommandResult::Settings(ControllerSettings::from_fields(4, [0; 4]));
        assert_eq!(settings.event_name(), "controller_settings");
    }
}
