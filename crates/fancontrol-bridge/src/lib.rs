//! Fan controller bridge.
//!
//! Connects the event bus to a fan/temperature controller on a serial port.
//! Requests arrive as events, run one at a time against the device, and the
//! results go back out as events.
//!
//! ## Units
//!
//! - [`FanControllerCommunicator`]: owns the serial transport, queues
//!   requests and retries failed exchanges
//! - [`StatusPoller`]: periodically requests a status report per channel
//! - [`PrintOutput`]: writes events to a stream, one per turn
//!
//! [`launch`] wires the configured units to a broker and starts them.

pub mod app;
pub mod communicator;
pub mod config;
pub mod error;
pub mod events;
pub mod output;
pub mod poller;
pub mod request;
pub mod serial;

pub use app::{launch, Bridge};
pub use communicator::{CommunicatorConfig, CommunicatorListener, FanControllerCommunicator};
pub use config::{BridgeConfig, ConfigError};
pub use error::BridgeError;
pub use events::{CommandOutcome, OutcomeType, EVENT_COMMAND_RESULTS};
pub use output::PrintOutput;
pub use poller::StatusPoller;
pub use request::{CommandRequest, RequestError};
pub use serial::SerialTransport;
