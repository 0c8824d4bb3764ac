//! Event bus for the fan controller bridge.
//!
//! Units run on their own threads and never share state directly. Every
//! event a unit publishes goes to the [`MessageBroker`], which copies it to
//! each attached subscriber. Inside a unit, an [`EventRegistry`] maps event
//! names to the listeners that handle them.
//!
//! ```text
//!  unit A ──publish──┐                        ┌──> unit A egress
//!  unit B ──publish──┼──> broker ingress ──> ├──> unit B egress
//!  unit C ──publish──┘                        └──> unit C egress
//! ```

pub mod broker;
pub mod error;
pub mod event;
pub mod registry;
pub mod stop;
pub mod unit;

pub use broker::{
    BrokerConfig, BrokerHandle, BrokerStats, BrokerThread, MessageBroker, Publisher, SubscriberId,
    Subscription,
};
pub use error::BusError;
pub use event::{Event, WILDCARD};
pub use registry::EventRegistry;
pub use stop::StopSignal;
pub use unit::{spawn_unit, IntervalTimer, Unit, UnitConfig, UnitContext, UnitHandle, UnitRunner};
