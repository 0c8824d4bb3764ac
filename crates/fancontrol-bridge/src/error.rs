//! Startup and shutdown errors.

use thiserror::Error;

use fancontrol_bus::BusError;

use crate::config::ConfigError;

/// Errors that stop the bridge from starting or shutting down cleanly.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to open serial port {port}: {source}")]
    Serial {
        port: String,
        #[source]
        source: serialport::Error,
    },

    #[error("bus error: {0}")]
    Bus(#[from] BusError),

    #[error("failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("thread '{0}' panicked")]
    Panicked(String),
}
