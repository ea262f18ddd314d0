use futures::future::BoxFuture;
use resilient_exec_core::{
    EventKind, ExecutionContext, MeteringEnricher, Operation, Outcome, PassThrough,
    ResilienceStrategy, StrategyContext, TelemetryDispatcher, TelemetryEvent, TelemetryListener,
};
use resilient_exec_retry::{RetryOptions, RetryStrategy};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Name given to pipelines built without one.
pub const DEFAULT_PIPELINE_NAME: &str = "default";

/// Runs operations under a resilience strategy.
///
/// A pipeline holds no per-call state, so one instance (or its clones) can
/// serve any number of concurrent executions. Each execution brings its own
/// [`ExecutionContext`].
///
/// # Examples
///
/// ```
/// use resilient_exec::{ContextPool, CancellationToken, Outcome, ResiliencePipeline, RetryOptions};
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pipeline = ResiliencePipeline::<u16, String>::builder()
///     .name("status")
///     .add_retry(
///         RetryOptions::builder()
///             .max_attempts(3)
///             .constant_backoff(Duration::from_millis(100))
///             .build()?,
///     )
///     .build();
///
/// let pool = ContextPool::new();
/// let context = pool.acquire(CancellationToken::new());
/// let outcome = pipeline
///     .execute(
///         |_ctx, uri: String| async move { Outcome::from_result(uri.len() as u16) },
///         &context,
///         "/ok".to_string(),
///     )
///     .await;
/// pool.release(context);
///
/// assert_eq!(outcome, Outcome::Success(3));
/// # Ok(())
/// # }
/// ```
pub struct ResiliencePipeline<T, E> {
    name: Arc<str>,
    strategy: Arc<dyn ResilienceStrategy<T, E>>,
    telemetry: TelemetryDispatcher,
}

impl<T, E> Clone for ResiliencePipeline<T, E> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            strategy: Arc::clone(&self.strategy),
            telemetry: self.telemetry.clone(),
        }
    }
}

impl<T, E> fmt::Debug for ResiliencePipeline<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResiliencePipeline")
            .field("name", &self.name)
            .field("strategy", &self.strategy.name())
            .field("telemetry", &self.telemetry)
            .finish()
    }
}

impl<T, E> ResiliencePipeline<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Creates a new builder.
    pub fn builder() -> ResiliencePipelineBuilder<T, E> {
        ResiliencePipelineBuilder::new()
    }

    /// A pipeline that invokes each operation exactly once.
    pub fn empty() -> Self {
        Self::builder().build()
    }

    /// Returns the pipeline name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the name of the strategy the pipeline runs.
    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    /// Returns the pipeline's observers.
    pub fn telemetry(&self) -> &TelemetryDispatcher {
        &self.telemetry
    }

    /// Runs `operation` under the pipeline's strategy.
    ///
    /// `state` is cloned into every attempt, so the operation does not have
    /// to capture its inputs. The terminal outcome of the strategy is
    /// returned unchanged. Errors from the operation are captured in the
    /// outcome; a panic inside the operation propagates to the caller.
    pub async fn execute<'a, F, Fut, S>(
        &'a self,
        mut operation: F,
        context: &'a ExecutionContext,
        state: S,
    ) -> Outcome<T, E>
    where
        F: FnMut(&'a ExecutionContext, S) -> Fut + Send + 'a,
        Fut: Future<Output = Outcome<T, E>> + Send + 'a,
        S: Clone + Send + 'a,
    {
        let started = Instant::now();
        self.report_executing(context);

        let operation: Operation<'a, T, E> =
            Box::new(move |ctx: &'a ExecutionContext| -> BoxFuture<'a, Outcome<T, E>> {
                Box::pin(operation(ctx, state.clone()))
            });
        let outcome = self
            .strategy
            .execute(
                operation,
                StrategyContext {
                    execution: context,
                    telemetry: &self.telemetry,
                    pipeline: &self.name,
                },
            )
            .await;

        self.report_executed(context, started.elapsed(), &outcome);
        outcome
    }

    fn report_executing(&self, context: &ExecutionContext) {
        if self.telemetry.is_empty() {
            return;
        }
        let event = TelemetryEvent::new(EventKind::PipelineExecuting, context)
            .source(&self.name, self.strategy.name());
        self.telemetry.report(event);
    }

    fn report_executed(&self, context: &ExecutionContext, duration: Duration, outcome: &Outcome<T, E>) {
        if self.telemetry.is_empty() {
            return;
        }
        let event = TelemetryEvent::new(EventKind::PipelineExecuted, context)
            .source(&self.name, self.strategy.name())
            .duration(duration)
            .outcome(outcome);
        self.telemetry.report(event);
    }
}

/// Builder for [`ResiliencePipeline`].
pub struct ResiliencePipelineBuilder<T, E> {
    name: String,
    strategy: Option<Arc<dyn ResilienceStrategy<T, E>>>,
    telemetry: TelemetryDispatcher,
}

impl<T, E> Default for ResiliencePipelineBuilder<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> ResiliencePipelineBuilder<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
{
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - name: `"default"`
    /// - strategy: pass-through (one attempt, no retries)
    /// - telemetry: no listeners or enrichers
    pub fn new() -> Self {
        Self {
            name: DEFAULT_PIPELINE_NAME.to_string(),
            strategy: None,
            telemetry: TelemetryDispatcher::new(),
        }
    }

    /// Sets the name reported in telemetry.
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Runs operations under a retry strategy built from `options`.
    ///
    /// Replaces any previously configured strategy.
    pub fn add_retry(self, options: RetryOptions<T, E>) -> Self {
        self.add_strategy(RetryStrategy::new(options))
    }

    /// Runs operations under a custom strategy.
    ///
    /// Replaces any previously configured strategy.
    pub fn add_strategy<S>(mut self, strategy: S) -> Self
    where
        S: ResilienceStrategy<T, E> + 'static,
    {
        if let Some(previous) = &self.strategy {
            tracing::debug!(
                pipeline = %self.name,
                replaced = previous.name(),
                "replacing pipeline strategy"
            );
        }
        self.strategy = Some(Arc::new(strategy));
        self
    }

    /// Registers a telemetry listener after the existing ones.
    pub fn add_listener<L>(mut self, listener: L) -> Self
    where
        L: TelemetryListener + 'static,
    {
        self.telemetry.add_listener(listener);
        self
    }

    /// Registers a metering enricher after the existing ones.
    pub fn add_enricher<M>(mut self, enricher: M) -> Self
    where
        M: MeteringEnricher + 'static,
    {
        self.telemetry.add_enricher(enricher);
        self
    }

    /// Replaces all observers with `telemetry`.
    pub fn telemetry(mut self, telemetry: TelemetryDispatcher) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Builds the pipeline.
    pub fn build(self) -> ResiliencePipeline<T, E> {
        let strategy = self
            .strategy
            .unwrap_or_else(|| Arc::new(PassThrough) as Arc<dyn ResilienceStrategy<T, E>>);
        ResiliencePipeline {
            name: Arc::from(self.name),
            strategy,
            telemetry: self.telemetry,
        }
    }
}
