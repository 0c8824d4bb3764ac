//! Unit runtime.
//!
//! A unit is an isolated worker with its own event registry and its own
//! egress subscription. Each runs a fixed-period loop on a dedicated thread:
//!
//! 1. drain every event waiting on the subscription and notify listeners
//! 2. call [`Unit::update`] (every turn, or once per interval for timed units)
//! 3. sleep for one tick
//!
//! A unit never sees two calls at once.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::broker::{BrokerHandle, Publisher, Subscription};
use crate::error::BusError;
use crate::event::Event;
use crate::registry::EventRegistry;
use crate::stop::StopSignal;

// ============================================================================
// Unit trait
// ============================================================================

/// Behaviour of one unit.
///
/// Listeners are plain values; the registry routes events to them and the
/// unit decides in [`Unit::notify`] what each listener does.
pub trait Unit: Send + 'static {
    /// Handle identifying one of this unit's listeners.
    type Listener: PartialEq + Send;

    /// Name used for the thread, logs and metric labels.
    fn name(&self) -> &str;

    /// Register listeners. Called once before the loop starts.
    fn register(&self, registry: &mut EventRegistry<Self::Listener>);

    /// Handle one event routed to `listener`.
    fn notify(&mut self, listener: &Self::Listener, event: &Event, ctx: &UnitContext);

    /// Periodic work.
    fn update(&mut self, ctx: &UnitContext);
}

/// What a unit can reach from inside its loop.
#[derive(Debug, Clone)]
pub struct UnitContext {
    name: String,
    publisher: Publisher,
}

impl UnitContext {
    /// Create a context for the unit called `name`.
    pub fn new(name: impl Into<String>, publisher: Publisher) -> Self {
        UnitContext {
            name: name.into(),
            publisher,
        }
    }

    /// Name of the owning unit.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Publish an event. A closed broker is logged and otherwise ignored,
    /// since the unit is about to be stopped anyway.
    pub fn publish(&self, event: Event) -> bool {
        trace!(unit = %self.name, event = %event.name, "publishing");
        match self.publisher.publish(event) {
            Ok(()) => true,
            Err(e) => {
                warn!(unit = %self.name, "could not publish: {}", e);
                false
            }
        }
    }

    /// Publish an event built from a name and payload.
    pub fn emit(&self, name: impl Into<String>, data: Value) -> bool {
        self.publish(Event::new(name, data))
    }
}

// ============================================================================
// Timing
// ============================================================================

/// Accumulates elapsed time and fires once per interval.
///
/// Overshoot is carried into the next period, so a slow loop does not make
/// the schedule drift.
#[derive(Debug, Clone)]
pub struct IntervalTimer {
    interval: Duration,
    elapsed: Duration,
}

impl IntervalTimer {
    /// Create a timer. `interval` must be non-zero.
    pub fn new(interval: Duration) -> Self {
        IntervalTimer {
            interval,
            elapsed: Duration::ZERO,
        }
    }

    /// Add `dt` and report whether the interval was reached.
    pub fn advance(&mut self, dt: Duration) -> bool {
        self.elapsed += dt;
        if self.elapsed >= self.interval {
            self.elapsed -= self.interval;
            true
        } else {
            false
        }
    }

    /// Time accumulated toward the next firing.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Configured interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// Loop settings for one unit.
#[derive(Debug, Clone)]
pub struct UnitConfig {
    /// Sleep between turns.
    pub tick: Duration,
    /// When set, `update` runs once per interval instead of every turn.
    pub interval: Option<Duration>,
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_millis(100),
            interval: None,
        }
    }
}

impl UnitConfig {
    /// Set the sleep between turns.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Make the unit timed.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }
}

// ============================================================================
// Runner
// ============================================================================

/// Drives one unit: event dispatch, updates and the tick loop.
pub struct UnitRunner<U: Unit> {
    unit: U,
    registry: EventRegistry<U::Listener>,
    subscription: Subscription,
    broker: BrokerHandle,
    ctx: UnitContext,
    timer: Option<IntervalTimer>,
    tick: Duration,
}

impl<U: Unit> UnitRunner<U> {
    /// Attach `unit` to the broker and register its listeners.
    pub fn new(unit: U, broker: &BrokerHandle, config: UnitConfig) -> Result<Self, BusError> {
        let timer = match config.interval {
            Some(interval) if interval.is_zero() => {
                return Err(BusError::ZeroInterval(unit.name().to_string()))
            }
            Some(interval) => Some(IntervalTimer::new(interval)),
            None => None,
        };
        let mut registry = EventRegistry::new();
        unit.register(&mut registry);
        let ctx = UnitContext::new(unit.name(), broker.publisher());
        Ok(UnitRunner {
            unit,
            registry,
            subscription: broker.new_subscriber(),
            broker: broker.clone(),
            ctx,
            timer,
            tick: config.tick,
        })
    }

    /// The wrapped unit.
    pub fn unit(&self) -> &U {
        &self.unit
    }

    /// The wrapped unit, mutably.
    pub fn unit_mut(&mut self) -> &mut U {
        &mut self.unit
    }

    /// The unit's listener registry.
    pub fn registry(&self) -> &EventRegistry<U::Listener> {
        &self.registry
    }

    /// Notify listeners of every event waiting on the subscription.
    /// Returns the number of events taken.
    pub fn dispatch_pending(&mut self) -> usize {
        let events = self.subscription.drain();
        for event in &events {
            let unit = &mut self.unit;
            let ctx = &self.ctx;
            self.registry
                .notify(&event.name, |listener| unit.notify(listener, event, ctx));
        }
        events.len()
    }

    /// One loop iteration after `elapsed` time. Returns whether `update` ran.
    pub fn turn(&mut self, elapsed: Duration) -> bool {
        self.dispatch_pending();
        let due = match &mut self.timer {
            Some(timer) => timer.advance(elapsed),
            None => true,
        };
        if due {
            self.unit.update(&self.ctx);
        }
        due
    }

    /// Loop until `stop` is set, then detach and give the unit back.
    pub fn run(mut self, stop: &StopSignal) -> U {
        debug!(unit = %self.ctx.name(), "unit started");
        let mut last = Instant::now();
        while !stop.is_stopped() {
            let now = Instant::now();
            self.turn(now - last);
            last = now;
            thread::sleep(self.tick);
        }
        self.broker.detach(self.subscription.id());
        debug!(unit = %self.ctx.name(), "unit stopped");
        self.unit
    }
}

/// Handle to a unit running on its own thread.
#[derive(Debug)]
pub struct UnitHandle<U> {
    name: String,
    thread: JoinHandle<U>,
}

impl<U> UnitHandle<U> {
    /// Unit name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if the unit thread has finished.
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Join the unit thread, returning the unit once its loop exits.
    pub fn join(self) -> thread::Result<U> {
        self.thread.join()
    }
}

/// Start `unit` on a dedicated thread.
///
/// The subscription is attached before this returns, so events published
/// afterwards are guaranteed to reach the unit.
pub fn spawn_unit<U: Unit>(
    unit: U,
    broker: &BrokerHandle,
    config: UnitConfig,
    stop: StopSignal,
) -> Result<UnitHandle<U>, BusError> {
    let name = unit.name().to_string();
    let runner = UnitRunner::new(unit, broker, config)?;
    let thread = thread::Builder::new()
        .name(format!("unit-{}", name))
        .spawn(move || runner.run(&stop))
        .map_err(|e| BusError::Spawn {
            name: name.clone(),
            reason: e.to_string(),
        })?;
    Ok(UnitHandle { name, thread })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{BrokerConfig, MessageBroker};
    use serde_json::json;

    #[derive(Debug, PartialEq)]
    enum Listener {
        Echo,
        Count,
    }

    #[derive(Default)]
    struct Recorder {
        seen: Vec<String>,
        counted: usize,
        updates: usize,
    }

    impl Unit for Recorder {
        type Listener = Listener;

        fn name(&self) -> &str {
            "recorder"
        }

        fn register(&self, registry: &mut EventRegistry<Listener>) {
            registry.register("ping", Listener::Echo);
            registry.register("*", Listener::Count);
        }

        fn notify(&mut self, listener: &Listener, event: &Event, ctx: &UnitContext) {
            match listener {
                Listener::Echo => {
                    self.seen.push(event.name.clone());
                    ctx.emit("pong", event.data.clone());
                }
                Listener::Count => self.counted += 1,
            }
        }

        fn update(&mut self, _ctx: &UnitContext) {
            self.updates += 1;
        }
    }

    #[test]
    fn test_interval_timer_carries_overshoot() {
        let mut timer = IntervalTimer::new(Duration::from_secs(1));
        assert!(!timer.advance(Duration::from_millis(700)));
        assert!(timer.advance(Duration::from_millis(700)));
        assert_eq!(timer.elapsed(), Duration::from_millis(400));
        assert!(timer.advance(Duration::from_millis(600)));
        assert_eq!(timer.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let (_broker, handle) = MessageBroker::new(BrokerConfig::default());
        let config = UnitConfig::default().with_interval(Duration::ZERO);
        let err = UnitRunner::new(Recorder::default(), &handle, config).err();
        assert_eq!(err, Some(BusError::ZeroInterval("recorder".to_string())));
    }

    #[test]
    fn test_turn_dispatches_then_updates() {
        let (broker, handle) = MessageBroker::new(BrokerConfig::default());
        let mut runner = UnitRunner::new(Recorder::default(), &handle, UnitConfig::default()).unwrap();
        let observer = handle.new_subscriber();

        handle.publisher().emit("ping", json!(7)).unwrap();
        handle.publisher().emit("other", json!(null)).unwrap();
        broker.step().unwrap();
        broker.step().unwrap();

        assert!(runner.turn(Duration::ZERO));
        let unit = runner.unit();
        assert_eq!(unit.seen, vec!["ping"]);
        assert_eq!(unit.counted, 2);
        assert_eq!(unit.updates, 1);

        // The pong goes back through the broker.
        broker.step().unwrap();
        let names: Vec<_> = observer.drain().iter().map(|e| e.name.clone()).collect();
        assert_eq!(names, vec!["ping", "other", "pong"]);
    }

    #[test]
    fn test_timed_unit_updates_on_interval() {
        let (_broker, handle) = MessageBroker::new(BrokerConfig::default());
        let config = UnitConfig::default().with_interval(Duration::from_secs(2));
        let mut runner = UnitRunner::new(Recorder::default(), &handle, config).unwrap();

        assert!(!runner.turn(Duration::from_secs(1)));
        assert!(runner.turn(Duration::from_secs(1)));
        assert!(!runner.turn(Duration::from_millis(500)));
        assert_eq!(runner.unit().updates, 1);
    }

    #[test]
    fn test_spawned_unit_stops_and_detaches() {
        let (_broker, handle) = MessageBroker::new(BrokerConfig::default());
        let stop = StopSignal::new();
        let config = UnitConfig::default().with_tick(Duration::from_millis(1));
        let unit = spawn_unit(Recorder::default(), &handle, config, stop.clone()).unwrap();
        assert_eq!(unit.name(), "recorder");
        assert_eq!(handle.subscriber_count(), 1);

        stop.stop();
        unit.join().unwrap();
        assert_eq!(handle.subscriber_count(), 0);
    }
}
