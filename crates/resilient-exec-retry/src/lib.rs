//! Bounded retry strategy for resilient-exec pipelines.
//!
//! This crate drives an operation through repeated attempts until it
//! succeeds, fails with a fault the classifier does not handle, runs out of
//! retries, or is cancelled.
//!
//! # Features
//!
//! - **Backoff curves**: constant, linear and exponential, with an optional cap
//! - **Jitter**: none by default, full or proportional, seedable for tests
//! - **Classifiers**: closures or [`FaultClassifier`] over results and errors
//! - **Callbacks**: `on_retry` sees the attempt, delay, outcome and context
//! - **Telemetry**: one `ExecutionAttempt` event per attempt, one `OnRetry` per retry
//! - **Settings**: `serde` feature loads [`RetrySettings`] from configuration
//!
//! # Examples
//!
//! ```
//! use resilient_exec_core::{ExecutionContext, Outcome, ResilienceStrategy, StrategyContext, TelemetryDispatcher};
//! use resilient_exec_retry::{FaultClassifier, RetryOptions, RetryStrategy};
//! use futures::FutureExt;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let strategy = RetryStrategy::new(
//!     RetryOptions::<u16, String>::builder()
//!         .max_attempts(3)
//!         .constant_backoff(Duration::from_millis(10))
//!         .should_handle(FaultClassifier::new().handle_result(|status: &u16| *status == 503))
//!         .build()?,
//! );
//!
//! let context = ExecutionContext::new();
//! let telemetry = TelemetryDispatcher::new();
//! let outcome = strategy
//!     .execute(
//!         Box::new(|_ctx: &ExecutionContext| async { Outcome::from_result(200) }.boxed()),
//!         StrategyContext { execution: &context, telemetry: &telemetry, pipeline: "example" },
//!     )
//!     .await;
//! assert_eq!(outcome, Outcome::Success(200));
//! # Ok(())
//! # }
//! ```

mod backoff;
mod classifier;
mod config;
#[cfg(feature = "serde")]
mod settings;

pub use backoff::{
    compute_delay, BackoffKind, FnInterval, FullJitter, IntervalFunction, Jitter, NoJitter,
    ProportionalJitter, StandardBackoff,
};
pub use classifier::{Classifier, ErrorPredicate, FaultClassifier, ResultPredicate};
pub use config::{
    DelayArguments, DelayGenerator, OnRetry, OnRetryArguments, RetryOptions, RetryOptionsBuilder,
    MAX_ATTEMPTS_LIMIT,
};
#[cfg(feature = "serde")]
pub use settings::RetrySettings;

use futures::future::BoxFuture;
use resilient_exec_core::{
    EventKind, ExecutionContext, Operation, Outcome, ResilienceStrategy, StrategyContext,
    TelemetryEvent,
};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;
use tokio::time::Instant;

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_histogram, histogram};

/// Terminal states of a retry execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Finish {
    Succeeded,
    Failed,
    Exhausted,
    Cancelled,
}

impl Finish {
    fn as_str(self) -> &'static str {
        match self {
            Finish::Succeeded => "succeeded",
            Finish::Failed => "failed",
            Finish::Exhausted => "exhausted",
            Finish::Cancelled => "cancelled",
        }
    }
}

/// Retries an operation according to its [`RetryOptions`].
///
/// One strategy serves any number of concurrent executions; the attempt
/// counter of each execution lives in its [`ExecutionContext`].
pub struct RetryStrategy<T, E> {
    options: RetryOptions<T, E>,
}

impl<T, E> RetryStrategy<T, E> {
    /// Creates a strategy from validated options.
    pub fn new(options: RetryOptions<T, E>) -> Self {
        #[cfg(feature = "metrics")]
        {
            describe_counter!(
                "retry_calls_total",
                "Total number of retry executions by result (succeeded, failed, exhausted, cancelled)"
            );
            describe_counter!("retry_attempts_total", "Total number of retries scheduled");
            describe_histogram!(
                "retry_attempts",
                "Number of attempts made per retry execution"
            );
        }

        Self { options }
    }

    /// Returns the options this strategy runs with.
    pub fn options(&self) -> &RetryOptions<T, E> {
        &self.options
    }
}

impl<T, E> From<RetryOptions<T, E>> for RetryStrategy<T, E> {
    fn from(options: RetryOptions<T, E>) -> Self {
        Self::new(options)
    }
}

impl<T, E> Clone for RetryStrategy<T, E> {
    fn clone(&self) -> Self {
        Self {
            options: self.options.clone(),
        }
    }
}

impl<T, E> std::fmt::Debug for RetryStrategy<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryStrategy")
            .field("options", &self.options)
            .finish()
    }
}

impl<T, E> RetryStrategy<T, E>
where
    T: 'static,
    E: 'static,
{
    fn report_attempt(
        &self,
        cx: &StrategyContext<'_>,
        attempt: u32,
        duration: Duration,
        handled: bool,
        outcome: &Outcome<T, E>,
    ) {
        if cx.telemetry.is_empty() {
            return;
        }
        let event = TelemetryEvent::new(EventKind::ExecutionAttempt, cx.execution)
            .source(cx.pipeline, &self.options.name)
            .attempt(attempt)
            .duration(duration)
            .handled(handled)
            .outcome(outcome);
        cx.telemetry.report(event);
    }

    fn report_retry(
        &self,
        cx: &StrategyContext<'_>,
        attempt: u32,
        duration: Duration,
        delay: Duration,
        outcome: &Outcome<T, E>,
    ) {
        if cx.telemetry.is_empty() {
            return;
        }
        let event = TelemetryEvent::new(EventKind::OnRetry, cx.execution)
            .source(cx.pipeline, &self.options.name)
            .attempt(attempt)
            .duration(duration)
            .handled(true)
            .retry_delay(delay)
            .outcome(outcome);
        cx.telemetry.report(event);
    }

    fn invoke_on_retry(&self, arguments: &OnRetryArguments<'_, T, E>) {
        for (index, callback) in self.options.on_retry.iter().enumerate() {
            if catch_unwind(AssertUnwindSafe(|| callback(arguments))).is_err() {
                tracing::warn!(
                    retry = %self.options.name,
                    callback = index,
                    attempt = arguments.attempt,
                    "on_retry callback panicked; continuing"
                );
            }
        }
    }

    fn finish(&self, finish: Finish, attempts: u32) {
        tracing::debug!(
            retry = %self.options.name,
            result = finish.as_str(),
            attempts,
            "retry execution finished"
        );

        #[cfg(feature = "metrics")]
        {
            counter!(
                "retry_calls_total",
                "retry" => self.options.name.clone(),
                "result" => finish.as_str()
            )
            .increment(1);
            histogram!("retry_attempts", "retry" => self.options.name.clone())
                .record(f64::from(attempts));
        }
    }

    /// Evaluates a finished attempt. Returns the terminal state, if any.
    fn evaluate(&self, outcome: &Outcome<T, E>, handled: bool, attempt: u32) -> Option<Finish> {
        if outcome.is_cancelled() {
            return Some(Finish::Cancelled);
        }
        if !handled {
            return Some(if outcome.is_success() {
                Finish::Succeeded
            } else {
                Finish::Failed
            });
        }
        if attempt >= self.options.max_attempts {
            return Some(Finish::Exhausted);
        }
        None
    }
}

impl<T, E> ResilienceStrategy<T, E> for RetryStrategy<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn name(&self) -> &str {
        &self.options.name
    }

    fn execute<'a>(
        &'a self,
        mut operation: Operation<'a, T, E>,
        cx: StrategyContext<'a>,
    ) -> BoxFuture<'a, Outcome<T, E>> {
        Box::pin(async move {
            let ctx: &ExecutionContext = cx.execution;
            let mut attempt: u32 = 0;
            ctx.set_attempt(attempt);

            loop {
                if ctx.is_cancelled() {
                    tracing::trace!(retry = %self.options.name, attempt, "cancelled before attempt");
                    self.finish(Finish::Cancelled, attempt);
                    return Outcome::cancelled();
                }

                tracing::trace!(retry = %self.options.name, attempt, "attempting");
                let started = Instant::now();
                let invocation = operation(ctx);
                let outcome = tokio::select! {
                    biased;
                    _ = ctx.cancelled() => Outcome::cancelled(),
                    outcome = invocation => outcome,
                };
                let duration = started.elapsed();

                let handled = !outcome.is_cancelled() && self.options.classifier.is_retriable(&outcome);
                self.report_attempt(&cx, attempt, duration, handled, &outcome);

                if let Some(finish) = self.evaluate(&outcome, handled, attempt) {
                    self.finish(finish, attempt + 1);
                    return outcome;
                }

                attempt += 1;
                ctx.set_attempt(attempt);
                let delay = self.options.delay_for(attempt, &outcome, ctx);
                self.invoke_on_retry(&OnRetryArguments {
                    attempt,
                    delay,
                    duration,
                    outcome: &outcome,
                    context: ctx,
                });
                self.report_retry(&cx, attempt, duration, delay, &outcome);

                tracing::debug!(
                    retry = %self.options.name,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "scheduling retry"
                );
                #[cfg(feature = "metrics")]
                counter!("retry_attempts_total", "retry" => self.options.name.clone()).increment(1);

                if !delay.is_zero() {
                    tokio::select! {
                        biased;
                        _ = ctx.cancelled() => {
                            tracing::trace!(retry = %self.options.name, attempt, "cancelled during backoff");
                            self.finish(Finish::Cancelled, attempt);
                            return Outcome::cancelled();
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        })
    }
}
