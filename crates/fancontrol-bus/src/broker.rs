//! Fan-out message broker.
//!
//! All publishers share one unbounded ingress channel. The broker loop takes
//! one event at a time from the ingress and hands a shared copy to every
//! attached subscriber in attachment order. Subscribers may be attached and
//! detached from any thread while the loop runs; a change affects deliveries
//! that start after it.

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use fancontrol_metrics::{metric_defs, metrics};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::BusError;
use crate::event::Event;
use crate::stop::StopSignal;

// ============================================================================
// Configuration
// ============================================================================

/// Broker loop settings.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// How long one loop iteration waits for an event before rechecking the
    /// stop signal.
    pub idle: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            idle: Duration::from_millis(100),
        }
    }
}

impl BrokerConfig {
    /// Set the idle wait.
    pub fn with_idle(mut self, idle: Duration) -> Self {
        self.idle = idle;
        self
    }
}

// ============================================================================
// Handles
// ============================================================================

/// Identifies an attached subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Counters describing broker activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BrokerStats {
    /// Events taken from the ingress.
    pub published: u64,
    /// Event copies handed to subscribers.
    pub delivered: u64,
    /// Subscribers currently attached.
    pub subscribers: usize,
}

#[derive(Debug, Default)]
struct Shared {
    subscribers: Mutex<Vec<(SubscriberId, Sender<Arc<Event>>)>>,
    next_id: AtomicU64,
    published: AtomicU64,
    delivered: AtomicU64,
}

impl Shared {
    fn record_subscriber_count(&self, count: usize) {
        metrics::gauge!(metric_defs::BROKER_SUBSCRIBERS.name).set(count as f64);
    }
}

/// Sends events into the broker.
#[derive(Debug, Clone)]
pub struct Publisher {
    ingress: Sender<Event>,
}

impl Publisher {
    /// Queue an event for delivery.
    pub fn publish(&self, event: Event) -> Result<(), BusError> {
        self.ingress.send(event).map_err(|_| BusError::Disconnected)
    }

    /// Queue an event built from a name and payload.
    pub fn emit(&self, name: impl Into<String>, data: Value) -> Result<(), BusError> {
        self.publish(Event::new(name, data))
    }
}

/// The receiving end of one subscriber.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    receiver: Receiver<Arc<Event>>,
}

impl Subscription {
    /// Identifier to pass to [`BrokerHandle::detach`].
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Underlying channel.
    pub fn receiver(&self) -> &Receiver<Arc<Event>> {
        &self.receiver
    }

    /// Take the next pending event without blocking.
    pub fn try_fetch(&self) -> Option<Arc<Event>> {
        self.receiver.try_recv().ok()
    }

    /// Wait up to `timeout` for the next event.
    pub fn fetch_timeout(&self, timeout: Duration) -> Option<Arc<Event>> {
        self.receiver.recv_timeout(timeout).ok()
    }

    /// Take every pending event without blocking.
    pub fn drain(&self) -> Vec<Arc<Event>> {
        self.receiver.try_iter().collect()
    }
}

/// Cloneable control handle for a broker.
#[derive(Debug, Clone)]
pub struct BrokerHandle {
    ingress: Sender<Event>,
    shared: Arc<Shared>,
}

impl BrokerHandle {
    /// A new publisher on the shared ingress.
    pub fn publisher(&self) -> Publisher {
        Publisher {
            ingress: self.ingress.clone(),
        }
    }

    /// Create an egress channel and attach it in one step, so no event can
    /// slip between creation and attachment.
    pub fn new_subscriber(&self) -> Subscription {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let id = self.attach(sender);
        Subscription { id, receiver }
    }

    /// Attach an existing egress channel.
    ///
    /// A channel that is already attached keeps its identifier and is not
    /// added again.
    pub fn attach(&self, sender: Sender<Arc<Event>>) -> SubscriberId {
        let mut subscribers = self.shared.subscribers.lock();
        if let Some((id, _)) = subscribers.iter().find(|(_, s)| s.same_channel(&sender)) {
            return *id;
        }
        let id = SubscriberId(self.shared.next_id.fetch_add(1, Ordering::Relaxed));
        subscribers.push((id, sender));
        self.shared.record_subscriber_count(subscribers.len());
        debug!(subscriber = %id, "attached subscriber");
        id
    }

    /// Detach a subscriber. Returns false if it was not attached.
    pub fn detach(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.shared.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        let removed = subscribers.len() != before;
        if removed {
            self.shared.record_subscriber_count(subscribers.len());
            debug!(subscriber = %id, "detached subscriber");
        }
        removed
    }

    /// Number of attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.lock().len()
    }

    /// Snapshot of the broker counters.
    pub fn stats(&self) -> BrokerStats {
        BrokerStats {
            published: self.shared.published.load(Ordering::Relaxed),
            delivered: self.shared.delivered.load(Ordering::Relaxed),
            subscribers: self.subscriber_count(),
        }
    }
}

// ============================================================================
// Broker
// ============================================================================

/// Owns the ingress and runs the delivery loop.
#[derive(Debug)]
pub struct MessageBroker {
    ingress: Receiver<Event>,
    shared: Arc<Shared>,
    config: BrokerConfig,
}

impl MessageBroker {
    /// Create a broker and its control handle.
    pub fn new(config: BrokerConfig) -> (MessageBroker, BrokerHandle) {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let shared = Arc::new(Shared::default());
        let broker = MessageBroker {
            ingress: receiver,
            shared: shared.clone(),
            config,
        };
        let handle = BrokerHandle {
            ingress: sender,
            shared,
        };
        (broker, handle)
    }

    /// Wait for one event and deliver it.
    ///
    /// Returns the number of subscribers reached, or `None` if nothing
    /// arrived within the idle wait. Fails once every publisher and handle
    /// has been dropped.
    pub fn step(&self) -> Result<Option<usize>, BusError> {
        match self.ingress.recv_timeout(self.config.idle) {
            Ok(event) => Ok(Some(self.deliver(event))),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(BusError::Disconnected),
        }
    }

    fn deliver(&self, event: Event) -> usize {
        let event = Arc::new(event);
        let snapshot: Vec<_> = self.shared.subscribers.lock().clone();

        let mut delivered = 0;
        let mut dead = Vec::new();
        for (id, sender) in &snapshot {
            if sender.send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(*id);
            }
        }

        if !dead.is_empty() {
            let mut subscribers = self.shared.subscribers.lock();
            subscribers.retain(|(id, _)| !dead.contains(id));
            self.shared.record_subscriber_count(subscribers.len());
            debug!(count = dead.len(), "dropped disconnected subscribers");
        }

        trace!(event = %event.name, delivered, "delivered event");
        self.shared.published.fetch_add(1, Ordering::Relaxed);
        self.shared
            .delivered
            .fetch_add(delivered as u64, Ordering::Relaxed);
        metrics::counter!(metric_defs::BROKER_PUBLISHED.name).increment(1);
        metrics::counter!(metric_defs::BROKER_DELIVERED.name).increment(delivered as u64);
        delivered
    }

    /// Run the delivery loop until `stop` is set or every publisher is gone.
    ///
    /// Events still queued when the loop exits are not delivered.
    pub fn run(&self, stop: &StopSignal) {
        debug!("message broker started");
        while !stop.is_stopped() {
            if let Err(BusError::Disconnected) = self.step() {
                debug!("all publishers dropped");
                break;
            }
        }
        debug!("message broker stopped");
    }

    /// Run the delivery loop on a dedicated thread.
    pub fn spawn(self, stop: StopSignal) -> io::Result<BrokerThread> {
        let thread = thread::Builder::new()
            .name("message-broker".to_string())
            .spawn(move || self.run(&stop))?;
        Ok(BrokerThread { thread })
    }
}

/// Handle to a broker running on its own thread.
#[derive(Debug)]
pub struct BrokerThread {
    thread: JoinHandle<()>,
}

impl BrokerThread {
    /// Check if the broker thread has finished.
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Join the broker thread, blocking until it exits.
    pub fn join(self) -> thread::Result<()> {
        self.thread.join()
    }
}
