//! YAML configuration.
//!
//! Every field has a default, so an empty file (or no file at all) yields a
//! working configuration for a controller on `/dev/ttyUSB0`.
//!
//! ```yaml
//! serial:
//!   port: /dev/ttyACM0
//!   baud: 9600
//!   timeout_secs: 5
//! communicator:
//!   command_event: controller_command
//!   max_tries: 3
//!   max_queue_len: 64
//!   tick_ms: 100
//! poller:
//!   interval_secs: 30
//!   channels: [0, 1]
//! print_output:
//!   events: ["*"]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use fancontrol_protocol::CommandKind;

/// Application directory name used in lookup paths.
pub const APP_NAME: &str = "fancontrolbridge";

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid value for {field}: {detail}")]
    Invalid { field: &'static str, detail: String },
}

// ============================================================================
// Sections
// ============================================================================

/// Serial link settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Device path, e.g. `/dev/ttyUSB0` or `COM3`.
    pub port: String,
    /// Baud rate. The firmware listens at 9600 by default.
    pub baud: u32,
    /// Read deadline in seconds.
    pub timeout_secs: f64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            baud: 9600,
            timeout_secs: 5.0,
        }
    }
}

impl SerialConfig {
    /// Read deadline.
    pub fn timeout(&self) -> Result<Duration, ConfigError> {
        seconds("serial.timeout_secs", self.timeout_secs)
    }
}

/// Dispatcher settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommunicatorSection {
    /// Event name carrying inbound requests.
    pub command_event: String,
    /// Attempts before a command is abandoned.
    pub max_tries: u32,
    /// Requests held at once; further requests are dropped.
    pub max_queue_len: usize,
    /// Loop period in milliseconds.
    pub tick_ms: u64,
}

impl Default for CommunicatorSection {
    fn default() -> Self {
        Self {
            command_event: "controller_command".to_string(),
            max_tries: 3,
            max_queue_len: 64,
            tick_ms: 100,
        }
    }
}

/// Broker loop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerSection {
    /// Idle wait per loop iteration in milliseconds.
    pub idle_ms: u64,
}

impl Default for BrokerSection {
    fn default() -> Self {
        Self { idle_ms: 100 }
    }
}

/// Periodic status requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Seconds between polls.
    pub interval_secs: f64,
    /// Channels to poll.
    pub channels: Vec<u8>,
    /// Commands sent per channel.
    pub commands: Vec<CommandKind>,
    /// Event name for the requests. Defaults to the communicator's.
    pub command_event: Option<String>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30.0,
            channels: vec![0],
            commands: vec![CommandKind::GetStatus],
            command_event: None,
        }
    }
}

impl PollerConfig {
    /// Poll interval.
    pub fn interval(&self) -> Result<Duration, ConfigError> {
        seconds("poller.interval_secs", self.interval_secs)
    }
}

/// Event printer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrintOutputConfig {
    /// Event names to print. `*` prints everything.
    pub events: Vec<String>,
}

impl Default for PrintOutputConfig {
    fn default() -> Self {
        Self {
            events: vec![fancontrol_bus::WILDCARD.to_string()],
        }
    }
}

// ============================================================================
// Root
// ============================================================================

/// Complete bridge configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub serial: SerialConfig,
    pub communicator: CommunicatorSection,
    pub broker: BrokerSection,
    /// Absent disables polling.
    pub poller: Option<PollerConfig>,
    /// Absent disables printing.
    pub print_output: Option<PrintOutputConfig>,
}

impl BridgeConfig {
    /// Parse a YAML document. An empty document gives the defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Read and parse a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Load from `explicit` if given, else from the first existing file in
    /// [`candidate_paths`], else defaults. Returns the file used, if any.
    pub fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        if let Some(path) = explicit {
            return Ok((Self::from_file(path)?, Some(path.to_path_buf())));
        }
        let xdg = std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from);
        match candidate_paths(xdg.as_deref(), home::home_dir().as_deref())
            .into_iter()
            .find(|p| p.is_file())
        {
            Some(path) => Ok((Self::from_file(&path)?, Some(path))),
            None => Ok((Self::default(), None)),
        }
    }
}

/// Lookup order for the configuration file when none is given explicitly.
pub fn candidate_paths(xdg_config_home: Option<&Path>, home: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(xdg) = xdg_config_home {
        paths.push(xdg.join(APP_NAME).join("config.yaml"));
    }
    if let Some(home) = home {
        let dotconfig = home.join(".config").join(APP_NAME).join("config.yaml");
        if !paths.contains(&dotconfig) {
            paths.push(dotconfig);
        }
        paths.push(home.join(format!(".{APP_NAME}-config.yaml")));
    }
    paths
}

fn seconds(field: &'static str, secs: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(secs).map_err(|e| ConfigError::Invalid {
        field,
        detail: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config = BridgeConfig::from_yaml_str("").unwrap();
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.serial.baud, 9600);
        assert_eq!(config.serial.timeout().unwrap(), Duration::from_secs(5));
        assert_eq!(config.communicator.max_tries, 3);
        assert!(config.poller.is_none());
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let yaml = r#"
serial:
  port: /dev/ttyACM1
poller:
  channels: [0, 1, 2]
print_output: {}
"#;
        let config = BridgeConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyACM1");
        assert_eq!(config.serial.baud, 9600);
        let poller = config.poller.unwrap();
        assert_eq!(poller.channels, vec![0, 1, 2]);
        assert_eq!(poller.commands, vec![CommandKind::GetStatus]);
        assert_eq!(poller.interval().unwrap(), Duration::from_secs(30));
        assert_eq!(config.print_output.unwrap().events, vec!["*"]);
    }

    #[test]
    fn test_poller_command_names() {
        let yaml = "poller:\n  commands: [GET_STATUS, GET_SETTINGS]\n";
        let config = BridgeConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(
            config.poller.unwrap().commands,
            vec![CommandKind::GetStatus, CommandKind::GetSettings]
        );
    }

    #[test]
    fn test_bad_yaml() {
        assert!(matches!(
            BridgeConfig::from_yaml_str("serial: [1, 2"),
            Err(ConfigError::Yaml(_))
        ));
        assert!(matches!(
            BridgeConfig::from_yaml_str("serial:\n  baud: fast\n"),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_negative_timeout() {
        let config = BridgeConfig::from_yaml_str("serial:\n  timeout_secs: -1\n").unwrap();
        assert!(matches!(
            config.serial.timeout(),
            Err(ConfigError::Invalid { field: "serial.timeout_secs", .. })
        ));
    }

    #[test]
    fn test_candidate_order() {
        let paths = candidate_paths(Some(Path::new("/xdg")), Some(Path::new("/home/u")));
        assert_eq!(
            paths,
            vec![
                PathBuf::from("/xdg/fancontrolbridge/config.yaml"),
                PathBuf::from("/home/u/.config/fancontrolbridge/config.yaml"),
                PathBuf::from("/home/u/.fancontrolbridge-config.yaml"),
            ]
        );
    }

    #[test]
    fn test_xdg_same_as_dotconfig_is_listed_once() {
        let paths = candidate_paths(
            Some(Path::new("/home/u/.config")),
            Some(Path::new("/home/u")),
        );
        assert_eq!(paths.len(), 2);
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = BridgeConfig::load(Some(Path::new("/nonexistent/fancontrolbridge.yaml")));
        assert!(matches!(err, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_load_explicit_file() {
        let path = std::env::temp_dir().join(format!(
            "fancontrolbridge-config-{}.yaml",
            std::process::id()
        ));
        std::fs::write(&path, "communicator:\n  command_event: fan/cmd\n").unwrap();

        let (config, used) = BridgeConfig::load(Some(&path)).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.communicator.command_event, "fan/cmd");
        assert_eq!(used.as_deref(), Some(path.as_path()));
    }
}
