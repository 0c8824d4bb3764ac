//! Periodic status requests.
//!
//! A timed unit: each time its interval elapses it publishes one request per
//! configured channel and command, on the same event name the communicator
//! listens to.

use serde_json::json;
use tracing::trace;

use fancontrol_bus::{Event, EventRegistry, Unit, UnitContext};
use fancontrol_protocol::CommandKind;

/// Publishes read requests on a schedule.
#[derive(Debug, Clone)]
pub struct StatusPoller {
    name: String,
    command_event: String,
    channels: Vec<u8>,
    commands: Vec<CommandKind>,
}

impl StatusPoller {
    pub fn new(command_event: impl Into<String>, channels: Vec<u8>) -> Self {
        StatusPoller {
            name: "poller".to_string(),
            command_event: command_event.into(),
            channels,
            commands: vec![CommandKind::GetStatus],
        }
    }

    /// Replace the commands sent per channel.
    pub fn with_commands(mut self, commands: Vec<CommandKind>) -> Self {
        self.commands = commands;
        self
    }

    /// Requests for one polling round, in publication order.
    pub fn requests(&self) -> Vec<Event> {
        self.channels
            .iter()
            .flat_map(|&channel| {
                self.commands.iter().map(move |kind| {
                    Event::new(
                        self.command_event.clone(),
                        json!({"command": kind.name(), "channel": channel}),
                    )
                })
            })
            .collect()
    }
}

impl Unit for StatusPoller {
    type Listener = ();

    fn name(&self) -> &str {
        &self.name
    }

    fn register(&self, _registry: &mut EventRegistry<()>) {}

    fn notify(&mut self, _listener: &(), _event: &Event, _ctx: &UnitContext) {}

    fn update(&mut self, ctx: &UnitContext) {
        trace!(channels = self.channels.len(), "polling");
        for request in self.requests() {
            ctx.publish(request);
        }
    }
}
