//! Command queue and dispatcher unit.
//!
//! Requests are queued in arrival order and only the head of the queue is
//! ever run against the device, one attempt per turn. A failed attempt stays
//! at the head until it succeeds or runs out of tries.

use std::collections::VecDeque;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, trace, warn};

use fancontrol_bus::{Event, EventRegistry, Unit, UnitContext};
use fancontrol_metrics::{metric_defs, metrics, MetricLabels};
use fancontrol_protocol::{Command, CommandEngine, RetryPolicy, Transport};

use crate::events::CommandOutcome;
use crate::request::{CommandRequest, RequestError};

/// Dispatcher settings.
#[derive(Debug, Clone)]
pub struct CommunicatorConfig {
    /// Unit name.
    pub name: String,
    /// Event name carrying requests.
    pub command_event: String,
    /// Retry limits.
    pub retry: RetryPolicy,
    /// Requests held at once.
    pub max_queue_len: usize,
}

impl Default for CommunicatorConfig {
    fn default() -> Self {
        Self {
            name: "communicator".to_string(),
            command_event: "controller_command".to_string(),
            retry: RetryPolicy::default(),
            max_queue_len: 64,
        }
    }
}

impl CommunicatorConfig {
    pub fn with_command_event(mut self, event: impl Into<String>) -> Self {
        self.command_event = event.into();
        self
    }

    pub fn with_max_tries(mut self, max_tries: u32) -> Self {
        self.retry = RetryPolicy { max_tries };
        self
    }

    pub fn with_max_queue_len(mut self, len: usize) -> Self {
        self.max_queue_len = len;
        self
    }
}

/// Listener handles of the communicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommunicatorListener {
    /// Inbound command requests.
    Request,
}

#[derive(Debug)]
struct PendingCommand {
    command: Command,
    original: Value,
}

/// Owns the device transport and serializes commands against it.
pub struct FanControllerCommunicator<T: Transport> {
    engine: CommandEngine<T>,
    queue: VecDeque<PendingCommand>,
    config: CommunicatorConfig,
    labels: MetricLabels,
}

impl<T: Transport> FanControllerCommunicator<T> {
    pub fn new(transport: T, config: CommunicatorConfig) -> Self {
        let labels = MetricLabels::new(config.name.clone());
        FanControllerCommunicator {
            engine: CommandEngine::new(transport),
            queue: VecDeque::new(),
            config,
            labels,
        }
    }

    /// Number of queued commands, including the one being retried.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Tries used so far by the head command.
    pub fn head_tries(&self) -> Option<u32> {
        self.queue.front().map(|p| p.command.tries())
    }

    pub fn transport(&self) -> &T {
        self.engine.transport()
    }

    pub fn config(&self) -> &CommunicatorConfig {
        &self.config
    }

    /// Queue a request. Bad requests are dropped and logged; returns whether
    /// the request was queued.
    pub fn submit(&mut self, data: &Value) -> bool {
        let request = match CommandRequest::from_value(data) {
            Ok(request) => request,
            Err(e) => {
                match &e {
                    RequestError::UnknownCommand(name) => {
                        trace!(command = %name, "ignoring unknown command")
                    }
                    _ => debug!("dropping malformed request {}: {}", data, e),
                }
                self.record_drop(e.reason());
                return false;
            }
        };

        if self.queue.len() >= self.config.max_queue_len {
            warn!(
                "command queue full ({} pending), dropping {}",
                self.queue.len(),
                request.kind
            );
            self.record_drop("queue_full");
            return false;
        }

        let command = match request.to_command() {
            Ok(command) => command,
            Err(e) => {
                debug!("dropping request {}: {}", data, e);
                self.record_drop("malformed");
                return false;
            }
        };

        trace!(command = %request.kind, channel = request.channel, "queued");
        self.queue.push_back(PendingCommand {
            command,
            original: request.original,
        });
        self.record_queue_depth();
        true
    }

    /// Run one attempt of the head command and return the events to publish.
    pub fn process_head(&mut self) -> Vec<Event> {
        let Some(head) = self.queue.front_mut() else {
            return Vec::new();
        };
        let kind = head.command.kind();
        let channel = head.command.channel();
        let labels = self.labels.clone().with_command(kind.name()).to_labels();

        metrics::counter!(metric_defs::COMMANDS_EXECUTED.name, &labels).increment(1);
        let started = Instant::now();
        let attempt = self.engine.execute(&mut head.command);
        metrics::histogram!(metric_defs::COMMAND_ATTEMPT_DURATION.name, &labels)
            .record(started.elapsed().as_micros() as f64);

        let events = match attempt {
            Ok(()) => {
                let mut events = Vec::with_capacity(2);
                if let Some(result) = head.command.take_result() {
                    match Event::from_serialize(result.event_name(), &result) {
                        Ok(event) => events.push(event),
                        Err(e) => warn!("could not encode {} result: {}", kind, e),
                    }
                }
                let message = format!("{} on channel {} succeeded", kind, channel);
                debug!("{}", message);
                events.push(CommandOutcome::success(message, head.original.clone()).to_event());
                self.queue.pop_front();
                metrics::counter!(metric_defs::COMMANDS_SUCCEEDED.name, &labels).increment(1);
                events
            }
            Err(e) if !e.is_recoverable() => {
                warn!("dropping {} on channel {}: {}", kind, channel, e);
                self.queue.pop_front();
                metrics::counter!(metric_defs::COMMANDS_MALFORMED.name, &labels).increment(1);
                Vec::new()
            }
            Err(e) => {
                let tries = head.command.increment_tries();
                if self.config.retry.exhausted(tries) {
                    warn!(
                        "giving up on {} on channel {} after {} tries: {}",
                        kind, channel, tries, e
                    );
                    let outcome = CommandOutcome::error(e.to_string(), head.original.clone());
                    self.queue.pop_front();
                    metrics::counter!(metric_defs::COMMANDS_ABANDONED.name, &labels).increment(1);
                    vec![outcome.to_event()]
                } else {
                    debug!(
                        "{} on channel {} failed (try {}): {}",
                        kind, channel, tries, e
                    );
                    metrics::counter!(metric_defs::COMMANDS_RETRIED.name, &labels).increment(1);
                    Vec::new()
                }
            }
        };
        self.record_queue_depth();
        events
    }

    fn record_drop(&self, reason: &'static str) {
        let labels = self.labels.with(&[("reason", reason.to_string())]);
        metrics::counter!(metric_defs::COMMANDS_DROPPED.name, &labels).increment(1);
    }

    fn record_queue_depth(&self) {
        metrics::gauge!(metric_defs::COMMAND_QUEUE_DEPTH.name, &self.labels.to_labels())
            .set(self.queue.len() as f64);
    }
}

impl<T: Transport + Send + 'static> Unit for FanControllerCommunicator<T> {
    type Listener = CommunicatorListener;

    fn name(&self) -> &str {
        &self.config.name
    }

    fn register(&self, registry: &mut EventRegistry<CommunicatorListener>) {
        registry.register(self.config.command_event.clone(), CommunicatorListener::Request);
    }

    fn notify(&mut self, listener: &CommunicatorListener, event: &Event, _ctx: &UnitContext) {
        match listener {
            CommunicatorListener::Request => {
                self.submit(&event.data);
            }
        }
    }

    fn update(&mut self, ctx: &UnitContext) {
        for event in self.process_head() {
            ctx.publish(event);
        }
    }
}
