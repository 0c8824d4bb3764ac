//! Metrics infrastructure for the fan controller bridge.
//!
//! This crate declares every metric the bridge records as a structured
//! [`Metric`] constant and provides label helpers. It re-exports the
//! `metrics` crate so callers record through the same facade.
//!
//! No recorder is installed here. Without one, recording is a no-op.
//!
//! # Example
//!
//! ```rust,ignore
//! use fancontrol_metrics::{describe_metrics, metric_defs, MetricLabels};
//!
//! describe_metrics();
//!
//! let labels = MetricLabels::new("communicator").with_command("SET_TARGET");
//! metrics::counter!(metric_defs::COMMANDS_EXECUTED.name, &labels.to_labels()).increment(1);
//! ```

pub use metrics;

use metrics::{describe_counter, describe_gauge, describe_histogram, Unit};

/// The kind of metric (counter, gauge, or histogram).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    /// A monotonically increasing counter.
    Counter,
    /// A gauge that can go up and down.
    Gauge,
    /// A histogram for recording distributions.
    Histogram,
}

/// A metric declaration with its metadata.
///
/// ```rust
/// use fancontrol_metrics::{Metric, MetricKind};
/// use metrics::Unit;
///
/// const RESETS: Metric = Metric::counter("fancontrol.serial.resets")
///     .with_description("Serial input buffer resets")
///     .with_unit(Unit::Count)
///     .with_labels(&["unit"]);
///
/// assert_eq!(RESETS.name, "fancontrol.serial.resets");
/// assert_eq!(RESETS.kind, MetricKind::Counter);
/// ```
#[derive(Debug, Clone)]
pub struct Metric {
    /// The metric name (e.g., "fancontrol.commands.executed").
    pub name: &'static str,
    /// The kind of metric.
    pub kind: MetricKind,
    /// Human-readable description of the metric.
    pub description: &'static str,
    /// The unit of measurement (optional).
    pub unit: Option<Unit>,
    /// Expected label keys for this metric.
    pub labels: &'static [&'static str],
}

impl Metric {
    const fn new(name: &'static str, kind: MetricKind) -> Self {
        Self {
            name,
            kind,
            description: "",
            unit: None,
            labels: &[],
        }
    }

    /// Creates a new counter metric with the given name.
    pub const fn counter(name: &'static str) -> Self {
        Self::new(name, MetricKind::Counter)
    }

    /// Creates a new gauge metric with the given name.
    pub const fn gauge(name: &'static str) -> Self {
        Self::new(name, MetricKind::Gauge)
    }

    /// Creates a new histogram metric with the given name.
    pub const fn histogram(name: &'static str) -> Self {
        Self::new(name, MetricKind::Histogram)
    }

    /// Sets the description for the metric.
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Sets the unit for the metric.
    pub const fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Sets the expected label keys for the metric.
    pub const fn with_labels(mut self, labels: &'static [&'static str]) -> Self {
        self.labels = labels;
        self
    }

    /// Registers this metric's description with the installed recorder.
    ///
    /// This should be called once at startup for each metric.
    pub fn describe(&self) {
        match (self.kind, self.unit) {
            (MetricKind::Counter, Some(unit)) => {
                describe_counter!(self.name, unit, self.description);
            }
            (MetricKind::Counter, None) => {
                describe_counter!(self.name, self.description);
            }
            (MetricKind::Gauge, Some(unit)) => {
                describe_gauge!(self.name, unit, self.description);
            }
            (MetricKind::Gauge, None) => {
                describe_gauge!(self.name, self.description);
            }
            (MetricKind::Histogram, Some(unit)) => {
                describe_histogram!(self.name, unit, self.description);
            }
            (MetricKind::Histogram, None) => {
                describe_histogram!(self.name, self.description);
            }
        }
    }
}

/// All metric definitions for the bridge.
pub mod metric_defs {
    use super::{Metric, Unit};

    // ========================================================================
    // Standard Label Keys
    // ========================================================================

    /// Labels present on every unit-scoped metric.
    pub const UNIT_LABELS: &[&str] = &["unit"];

    /// Labels on per-command metrics.
    pub const COMMAND_LABELS: &[&str] = &["unit", "command"];

    // ========================================================================
    // Command Dispatch Metrics
    // ========================================================================

    /// Command attempts run against the device.
    ///
    /// Labels: unit, command
    pub const COMMANDS_EXECUTED: Metric = Metric::counter("fancontrol.commands.executed")
        .with_description("Command attempts run against the device")
        .with_unit(Unit::Count)
        .with_labels(COMMAND_LABELS);

    /// Commands that completed successfully.
    ///
    /// Labels: unit, command
    pub const COMMANDS_SUCCEEDED: Metric = Metric::counter("fancontrol.commands.succeeded")
        .with_description("Commands that completed successfully")
        .with_unit(Unit::Count)
        .with_labels(COMMAND_LABELS);

    /// Failed attempts left at the head of the queue for another try.
    ///
    /// Labels: unit, command
    pub const COMMANDS_RETRIED: Metric = Metric::counter("fancontrol.commands.retried")
        .with_description("Failed attempts that will be retried")
        .with_unit(Unit::Count)
        .with_labels(COMMAND_LABELS);

    /// Commands dropped after exhausting their attempts.
    ///
    /// Labels: unit, command
    pub const COMMANDS_ABANDONED: Metric = Metric::counter("fancontrol.commands.abandoned")
        .with_description("Commands dropped after exhausting retries")
        .with_unit(Unit::Count)
        .with_labels(COMMAND_LABELS);

    /// Commands whose value could not be encoded.
    ///
    /// Labels: unit, command
    pub const COMMANDS_MALFORMED: Metric = Metric::counter("fancontrol.commands.malformed")
        .with_description("Commands dropped because their value could not be encoded")
        .with_unit(Unit::Count)
        .with_labels(COMMAND_LABELS);

    /// Requests rejected before being queued (unknown, malformed or queue full).
    ///
    /// Labels: unit, reason
    pub const COMMANDS_DROPPED: Metric = Metric::counter("fancontrol.commands.dropped")
        .with_description("Requests rejected before being queued")
        .with_unit(Unit::Count)
        .with_labels(&["unit", "reason"]);

    /// Duration of one command attempt.
    ///
    /// Labels: unit, command
    pub const COMMAND_ATTEMPT_DURATION: Metric =
        Metric::histogram("fancontrol.commands.attempt_duration_us")
            .with_description("Duration of one command attempt in microseconds")
            .with_unit(Unit::Microseconds)
            .with_labels(COMMAND_LABELS);

    /// Commands waiting in the dispatcher queue.
    ///
    /// Labels: unit
    pub const COMMAND_QUEUE_DEPTH: Metric = Metric::gauge("fancontrol.commands.queue_depth")
        .with_description("Commands waiting in the dispatcher queue")
        .with_unit(Unit::Count)
        .with_labels(UNIT_LABELS);

    // ========================================================================
    // Broker Metrics
    // ========================================================================

    /// Events taken from the broker ingress.
    pub const BROKER_PUBLISHED: Metric = Metric::counter("fancontrol.broker.published")
        .with_description("Events received on the broker ingress")
        .with_unit(Unit::Count);

    /// Event copies handed to subscribers.
    pub const BROKER_DELIVERED: Metric = Metric::counter("fancontrol.broker.delivered")
        .with_description("Event deliveries to subscriber channels")
        .with_unit(Unit::Count);

    /// Subscribers currently attached.
    pub const BROKER_SUBSCRIBERS: Metric = Metric::gauge("fancontrol.broker.subscribers")
        .with_description("Subscriber channels currently attached")
        .with_unit(Unit::Count);

    /// Every metric defined above.
    pub const ALL: &[&Metric] = &[
        &COMMANDS_EXECUTED,
        &COMMANDS_SUCCEEDED,
        &COMMANDS_RETRIED,
        &COMMANDS_ABANDONED,
        &COMMANDS_MALFORMED,
        &COMMANDS_DROPPED,
        &COMMAND_ATTEMPT_DURATION,
        &COMMAND_QUEUE_DEPTH,
        &BROKER_PUBLISHED,
        &BROKER_DELIVERED,
        &BROKER_SUBSCRIBERS,
    ];
}

/// Labels identifying the unit that records a metric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricLabels {
    /// Unit name.
    pub unit: String,
    /// Command name, for per-command metrics.
    pub command: Option<String>,
}

impl MetricLabels {
    /// Creates labels for a unit.
    pub fn new(unit: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            command: None,
        }
    }

    /// Adds the command label.
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    /// Converts to the label format used by the `metrics` macros.
    pub fn to_labels(&self) -> Vec<(&'static str, String)> {
        let mut labels = vec![("unit", self.unit.clone())];
        if let Some(command) = &self.command {
            labels.push(("command", command.clone()));
        }
        labels
    }

    /// Returns labels with additional key-value pairs.
    pub fn with(&self, extra: &[(&'static str, String)]) -> Vec<(&'static str, String)> {
        let mut labels = self.to_labels();
        labels.extend_from_slice(extra);
        labels
    }
}

/// Describes all metrics used by the bridge.
///
/// Call once at startup, after installing a recorder.
pub fn describe_metrics() {
    for metric in metric_defs::ALL {
        metric.describe();
    }
}

/// Installs a Prometheus recorder with an HTTP scrape endpoint on `addr`.
#[cfg(feature = "prometheus")]
pub fn install_prometheus(
    addr: std::net::SocketAddr,
) -> Result<(), metrics_exporter_prometheus::BuildError> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    describe_metrics();
    Ok(())
}
