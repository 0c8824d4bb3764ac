//! Bus error types.

use thiserror::Error;

/// Errors raised by bus handles and the unit runtime.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// The broker has shut down and no longer accepts events.
    #[error("message broker is disconnected")]
    Disconnected,

    /// A unit was configured with a zero update interval.
    #[error("update interval for unit '{0}' must be greater than zero")]
    ZeroInterval(String),

    /// The operating system refused to start a thread.
    #[error("failed to spawn thread for '{name}': {reason}")]
    Spawn {
        /// Thread owner.
        name: String,
        /// OS error message.
        reason: String,
    },
}
