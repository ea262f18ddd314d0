//! Resilience pipelines for async operations.
//!
//! `resilient-exec` runs an operation under a resilience strategy (bounded
//! retry with backoff, or a single pass-through attempt), reporting every
//! attempt to pluggable telemetry observers. Per-call state lives in an
//! [`ExecutionContext`] drawn from an explicit [`ContextPool`].
//!
//! # Crates
//!
//! - `resilient-exec-core`: outcomes, contexts, pooling, telemetry and the
//!   strategy trait, re-exported at the root of this crate
//! - [`retry`]: the retry strategy, backoff curves, jitter and classifiers
//!
//! This crate adds [`ResiliencePipeline`], the named [`PipelineRegistry`]
//! and the [`PipelineLayer`] Tower adapter.
//!
//! # Example
//!
//! ```rust,no_run
//! use resilient_exec::{
//!     CancellationToken, ContextPool, FaultClassifier, Outcome, PropertyKey, ResiliencePipeline,
//!     RetryOptions,
//! };
//! use std::time::Duration;
//!
//! const REQUEST: PropertyKey<String> = PropertyKey::new("request");
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = ResiliencePipeline::<u16, String>::builder()
//!     .add_retry(
//!         RetryOptions::builder()
//!             .max_attempts(3)
//!             .constant_backoff(Duration::from_secs(1))
//!             .should_handle(
//!                 FaultClassifier::new()
//!                     .handle_result(|status: &u16| matches!(*status, 408 | 429 | 504))
//!                     .ignore_errors(),
//!             )
//!             .on_retry(|args| {
//!                 let request = args.context.properties().get(REQUEST).unwrap_or_default();
//!                 println!("Request {request} failed, retry #{} in {:?}", args.attempt, args.delay);
//!             })
//!             .build()?,
//!     )
//!     .build();
//!
//! let pool = ContextPool::new();
//! let context = pool.acquire(CancellationToken::new());
//! let outcome = pipeline
//!     .execute(
//!         |ctx, uri: String| {
//!             ctx.properties().set(REQUEST, uri);
//!             async { Outcome::from_result(200) }
//!         },
//!         &context,
//!         "/status".to_string(),
//!     )
//!     .await;
//! pool.release(context);
//! # Ok(())
//! # }
//! ```

mod layer;
mod pipeline;
mod registry;

pub use layer::{PipelineLayer, PipelineService};
pub use pipeline::{ResiliencePipeline, ResiliencePipelineBuilder, DEFAULT_PIPELINE_NAME};
pub use registry::PipelineRegistry;

pub use resilient_exec_retry as retry;

pub use resilient_exec_core::{
    BoxError, CancellationToken, ConfigError, ContextPool, EventKind, ExecutionContext, ExecutionError,
    FnEnricher, FnListener, MeteringEnricher, Operation, Outcome, OutcomeKind, PassThrough,
    Properties, PropertyKey, ResilienceStrategy, StrategyContext, Tag, TelemetryDispatcher,
    TelemetryEvent, TelemetryListener, TracingListener,
};
#[cfg(feature = "metrics")]
pub use resilient_exec_core::MeteringListener;
pub use resilient_exec_retry::{BackoffKind, Classifier, FaultClassifier, RetryOptions};
#[cfg(feature = "serde")]
pub use resilient_exec_retry::RetrySettings;
