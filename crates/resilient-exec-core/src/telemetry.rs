//! Telemetry fan-out for resilience strategies.
//!
//! Every strategy reports what it does through a [`TelemetryDispatcher`]: one
//! [`TelemetryEvent`] per attempt, per retry and per pipeline execution. The
//! dispatcher first lets each registered [`MeteringEnricher`] add [`Tag`]s to
//! a fresh tag list, attaches the tags to the event, then hands the event to
//! every [`TelemetryListener`] in registration order.
//!
//! Observers are isolated from each other and from the strategy: a listener
//! or enricher that panics is logged and skipped, and the remaining observers
//! still run.

use crate::context::ExecutionContext;
use crate::outcome::{Outcome, OutcomeKind};
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// What a [`TelemetryEvent`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A pipeline execution is starting.
    PipelineExecuting,
    /// A pipeline execution finished; `duration` covers the whole execution.
    PipelineExecuted,
    /// One invocation of the operation finished; `duration` covers that invocation.
    ExecutionAttempt,
    /// A retry was scheduled; `retry_delay` holds the backoff about to be waited.
    OnRetry,
}

impl EventKind {
    /// Returns the event name used in logs and metric tags.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::PipelineExecuting => "PipelineExecuting",
            EventKind::PipelineExecuted => "PipelineExecuted",
            EventKind::ExecutionAttempt => "ExecutionAttempt",
            EventKind::OnRetry => "OnRetry",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A key/value pair attached to a telemetry event by enrichers.
///
/// Keys need not be unique; tags keep the order they were added in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    /// Tag name.
    pub key: String,
    /// Tag value.
    pub value: String,
}

impl Tag {
    /// Creates a new tag.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A single telemetry report.
///
/// Events borrow the execution context they describe, so listeners can read
/// properties the operation stored (for example the request being retried).
pub struct TelemetryEvent<'a> {
    /// What happened.
    pub kind: EventKind,
    /// Name of the pipeline that emitted the event.
    pub pipeline: &'a str,
    /// Name of the strategy that emitted the event.
    pub strategy: &'a str,
    /// Attempt number: 0 for the initial try, n for the n-th retry.
    pub attempt: u32,
    /// Duration of the attempt or execution being reported.
    pub duration: Duration,
    /// Whether the strategy classified the outcome as a handled fault.
    pub handled: bool,
    /// Backoff chosen for the upcoming retry (only for [`EventKind::OnRetry`]).
    pub retry_delay: Option<Duration>,
    /// The execution this event belongs to.
    pub context: &'a ExecutionContext,
    /// Tags added by enrichers. Empty until the dispatcher has run them.
    pub tags: Vec<Tag>,
    outcome: Option<(OutcomeKind, &'a (dyn Any + 'static))>,
    timestamp: Instant,
}

impl<'a> TelemetryEvent<'a> {
    /// Creates an event of `kind` for `context`.
    pub fn new(kind: EventKind, context: &'a ExecutionContext) -> Self {
        Self {
            kind,
            pipeline: "",
            strategy: "",
            attempt: context.attempt(),
            duration: Duration::ZERO,
            handled: false,
            retry_delay: None,
            context,
            tags: Vec::new(),
            outcome: None,
            timestamp: Instant::now(),
        }
    }

    /// Sets the pipeline and strategy names.
    pub fn source(mut self, pipeline: &'a str, strategy: &'a str) -> Self {
        self.pipeline = pipeline;
        self.strategy = strategy;
        self
    }

    /// Sets the attempt number.
    pub fn attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    /// Sets the reported duration.
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Marks whether the outcome was a handled fault.
    pub fn handled(mut self, handled: bool) -> Self {
        self.handled = handled;
        self
    }

    /// Sets the upcoming retry delay.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Attaches the outcome this event reports on.
    pub fn outcome<T, E>(mut self, outcome: &'a Outcome<T, E>) -> Self
    where
        T: 'static,
        E: 'static,
    {
        self.outcome = Some((outcome.kind(), outcome as &(dyn Any + 'static)));
        self
    }

    /// Returns the event name.
    pub fn event_type(&self) -> &'static str {
        self.kind.as_str()
    }

    /// Returns when the event was created.
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// Returns the kind of the attached outcome, if any.
    pub fn outcome_kind(&self) -> Option<OutcomeKind> {
        self.outcome.map(|(kind, _)| kind)
    }

    /// Returns the attached outcome if it has the requested type.
    ///
    /// The outcome is opaque to listeners that don't know the pipeline's
    /// result and error types; those that do can recover it here.
    pub fn outcome_as<T, E>(&self) -> Option<&'a Outcome<T, E>>
    where
        T: 'static,
        E: 'static,
    {
        self.outcome.and_then(|(_, any)| any.downcast_ref::<Outcome<T, E>>())
    }

    /// Returns the value of the last tag named `key`.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .rev()
            .find(|tag| tag.key == key)
            .map(|tag| tag.value.as_str())
    }
}

impl fmt::Debug for TelemetryEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelemetryEvent")
            .field("kind", &self.kind)
            .field("pipeline", &self.pipeline)
            .field("strategy", &self.strategy)
            .field("attempt", &self.attempt)
            .field("duration", &self.duration)
            .field("handled", &self.handled)
            .field("retry_delay", &self.retry_delay)
            .field("outcome", &self.outcome_kind())
            .field("tags", &self.tags)
            .finish()
    }
}

/// Observer notified of every telemetry event.
pub trait TelemetryListener: Send + Sync {
    /// Called for each event, after enrichment.
    fn write(&self, event: &TelemetryEvent<'_>);
}

/// Observer that adds descriptive tags to each telemetry event.
pub trait MeteringEnricher: Send + Sync {
    /// Appends tags for `event` to `tags`.
    fn enrich(&self, event: &TelemetryEvent<'_>, tags: &mut Vec<Tag>);
}

/// A closure-based telemetry listener.
pub struct FnListener<F> {
    f: F,
}

impl<F> FnListener<F>
where
    F: Fn(&TelemetryEvent<'_>) + Send + Sync,
{
    /// Creates a new function-based listener.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> TelemetryListener for FnListener<F>
where
    F: Fn(&TelemetryEvent<'_>) + Send + Sync,
{
    fn write(&self, event: &TelemetryEvent<'_>) {
        (self.f)(event)
    }
}

/// A closure-based metering enricher.
pub struct FnEnricher<F> {
    f: F,
}

impl<F> FnEnricher<F>
where
    F: Fn(&TelemetryEvent<'_>, &mut Vec<Tag>) + Send + Sync,
{
    /// Creates a new function-based enricher.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> MeteringEnricher for FnEnricher<F>
where
    F: Fn(&TelemetryEvent<'_>, &mut Vec<Tag>) + Send + Sync,
{
    fn enrich(&self, event: &TelemetryEvent<'_>, tags: &mut Vec<Tag>) {
        (self.f)(event, tags)
    }
}

/// Type alias for shared listeners.
pub type BoxedListener = Arc<dyn TelemetryListener>;

/// Type alias for shared enrichers.
pub type BoxedEnricher = Arc<dyn MeteringEnricher>;

/// Ordered collections of listeners and enrichers.
///
/// Cloning is cheap: observers are shared behind `Arc`s.
#[derive(Clone, Default)]
pub struct TelemetryDispatcher {
    listeners: Vec<BoxedListener>,
    enrichers: Vec<BoxedEnricher>,
}

impl TelemetryDispatcher {
    /// Creates a dispatcher with no observers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener after the existing ones.
    pub fn add_listener<L>(&mut self, listener: L)
    where
        L: TelemetryListener + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Registers an already shared listener.
    pub fn add_shared_listener(&mut self, listener: BoxedListener) {
        self.listeners.push(listener);
    }

    /// Registers an enricher after the existing ones.
    pub fn add_enricher<M>(&mut self, enricher: M)
    where
        M: MeteringEnricher + 'static,
    {
        self.enrichers.push(Arc::new(enricher));
    }

    /// Returns `true` if no listener is registered.
    ///
    /// Enrichers alone produce nothing observable, so events are skipped.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Returns the number of listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Returns the number of enrichers.
    pub fn enricher_count(&self) -> usize {
        self.enrichers.len()
    }

    /// Enriches `event` and delivers it to every listener.
    pub fn report(&self, mut event: TelemetryEvent<'_>) {
        if self.listeners.is_empty() {
            return;
        }

        let mut tags = Vec::new();
        for (index, enricher) in self.enrichers.iter().enumerate() {
            let result = catch_unwind(AssertUnwindSafe(|| enricher.enrich(&event, &mut tags)));
            if result.is_err() {
                tracing::warn!(
                    enricher = index,
                    event = event.kind.as_str(),
                    "metering enricher panicked; continuing with remaining enrichers"
                );
            }
        }
        event.tags = tags;

        for (index, listener) in self.listeners.iter().enumerate() {
            let result = catch_unwind(AssertUnwindSafe(|| listener.write(&event)));
            if result.is_err() {
                tracing::warn!(
                    listener = index,
                    event = event.kind.as_str(),
                    "telemetry listener panicked; continuing with remaining listeners"
                );
            }
        }
    }
}

impl fmt::Debug for TelemetryDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelemetryDispatcher")
            .field("listeners", &self.listeners.len())
            .field("enrichers", &self.enrichers.len())
            .finish()
    }
}
