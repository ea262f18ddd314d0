//! The execution contract shared by all resilience strategies.

use crate::context::ExecutionContext;
use crate::outcome::Outcome;
use crate::telemetry::TelemetryDispatcher;
use futures::future::BoxFuture;

/// A type-erased operation invocation.
///
/// Each call starts one attempt of the wrapped operation. The returned future
/// must capture every failure into the [`Outcome`] instead of panicking.
pub type Operation<'a, T, E> =
    Box<dyn FnMut(&'a ExecutionContext) -> BoxFuture<'a, Outcome<T, E>> + Send + 'a>;

/// Everything a strategy needs besides the operation itself.
#[derive(Clone, Copy, Debug)]
pub struct StrategyContext<'a> {
    /// The execution's context.
    pub execution: &'a ExecutionContext,
    /// Observers of the enclosing pipeline.
    pub telemetry: &'a TelemetryDispatcher,
    /// Name of the enclosing pipeline.
    pub pipeline: &'a str,
}

/// A resilience strategy drives an operation to a terminal [`Outcome`].
///
/// Strategies are stateless with respect to individual executions: all
/// per-call state lives in the [`ExecutionContext`], so one strategy value
/// can serve any number of concurrent executions.
pub trait ResilienceStrategy<T, E>: Send + Sync {
    /// Name used in telemetry.
    fn name(&self) -> &str;

    /// Runs `operation` under this strategy and returns the terminal outcome.
    fn execute<'a>(
        &'a self,
        operation: Operation<'a, T, E>,
        context: StrategyContext<'a>,
    ) -> BoxFuture<'a, Outcome<T, E>>;
}

/// Invokes the operation exactly once, racing the cancellation signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassThrough;

impl<T, E> ResilienceStrategy<T, E> for PassThrough
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn name(&self) -> &str {
        "pass-through"
    }

    fn execute<'a>(
        &'a self,
        mut operation: Operation<'a, T, E>,
        context: StrategyContext<'a>,
    ) -> BoxFuture<'a, Outcome<T, E>> {
        Box::pin(async move {
            if context.execution.is_cancelled() {
                return Outcome::cancelled();
            }
            let attempt = operation(context.execution);
            tokio::select! {
                biased;
                _ = context.execution.cancelled() => Outcome::cancelled(),
                outcome = attempt => outcome,
            }
        })
    }
}
