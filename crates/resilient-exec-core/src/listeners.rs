//! Ready-made telemetry listeners.

use crate::telemetry::{EventKind, TelemetryEvent, TelemetryListener};

/// Logs every telemetry event through `tracing`.
///
/// Handled attempts and retries are logged at `WARN`, completed executions
/// and unhandled attempts at `INFO`, execution starts at `DEBUG`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingListener;

impl TracingListener {
    /// Creates a new tracing listener.
    pub fn new() -> Self {
        Self
    }
}

impl TelemetryListener for TracingListener {
    fn write(&self, event: &TelemetryEvent<'_>) {
        let outcome = event.outcome_kind().map(|kind| kind.as_str()).unwrap_or("none");
        let operation_key = event.context.operation_key().unwrap_or("");
        match event.kind {
            EventKind::PipelineExecuting => {
                tracing::debug!(
                    pipeline = event.pipeline,
                    operation_key,
                    "resilience pipeline executing"
                );
            }
            EventKind::PipelineExecuted => {
                tracing::info!(
                    pipeline = event.pipeline,
                    operation_key,
                    outcome,
                    duration = ?event.duration,
                    "resilience pipeline executed"
                );
            }
            EventKind::ExecutionAttempt if event.handled => {
                tracing::warn!(
                    pipeline = event.pipeline,
                    strategy = event.strategy,
                    operation_key,
                    attempt = event.attempt,
                    outcome,
                    handled = true,
                    duration = ?event.duration,
                    "execution attempt"
                );
            }
            EventKind::ExecutionAttempt => {
                tracing::info!(
                    pipeline = event.pipeline,
                    strategy = event.strategy,
                    operation_key,
                    attempt = event.attempt,
                    outcome,
                    handled = false,
                    duration = ?event.duration,
                    "execution attempt"
                );
            }
            EventKind::OnRetry => {
                tracing::warn!(
                    pipeline = event.pipeline,
                    strategy = event.strategy,
                    operation_key,
                    attempt = event.attempt,
                    outcome,
                    delay = ?event.retry_delay,
                    "resilience event: retrying"
                );
            }
        }
    }
}

#[cfg(feature = "metrics")]
pub use metering::MeteringListener;

#[cfg(feature = "metrics")]
mod metering {
    use crate::telemetry::{EventKind, TelemetryEvent, TelemetryListener};
    use metrics::{counter, describe_counter, describe_histogram, histogram, Label};
    use std::sync::Once;

    static DESCRIBE: Once = Once::new();

    /// Records telemetry events as metrics.
    ///
    /// Every event increments `resilience_events_total`; attempts also record
    /// their duration in `resilience_attempt_duration_seconds`. Labels are the
    /// event name, pipeline, strategy, outcome, and every enriched tag.
    #[derive(Debug, Clone, Copy)]
    pub struct MeteringListener;

    impl MeteringListener {
        /// Creates a new metering listener.
        pub fn new() -> Self {
            DESCRIBE.call_once(|| {
                describe_counter!(
                    "resilience_events_total",
                    "Total number of resilience telemetry events"
                );
                describe_histogram!(
                    "resilience_attempt_duration_seconds",
                    "Duration of individual execution attempts"
                );
            });
            Self
        }
    }

    impl Default for MeteringListener {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TelemetryListener for MeteringListener {
        fn write(&self, event: &TelemetryEvent<'_>) {
            let mut labels = vec![
                Label::new("event", event.kind.as_str()),
                Label::new("pipeline", event.pipeline.to_string()),
                Label::new("strategy", event.strategy.to_string()),
            ];
            if let Some(kind) = event.outcome_kind() {
                labels.push(Label::new("outcome", kind.as_str()));
            }
            for tag in &event.tags {
                labels.push(Label::new(tag.key.clone(), tag.value.clone()));
            }

            counter!("resilience_events_total", labels.clone()).increment(1);
            if event.kind == EventKind::ExecutionAttempt {
                histogram!("resilience_attempt_duration_seconds", labels)
                    .record(event.duration.as_secs_f64());
            }
        }
    }
}
