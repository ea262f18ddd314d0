//! Core infrastructure for resilient-exec.
//!
//! This crate provides the pieces every resilience strategy shares:
//! - [`Outcome`]: the success/failure container an operation produces
//! - [`ExecutionContext`] and [`ContextPool`]: per-call state and its reuse
//! - [`TelemetryDispatcher`]: listener and enricher fan-out for observability
//! - [`ResilienceStrategy`]: the execution contract strategies implement

pub mod context;
pub mod error;
pub mod listeners;
pub mod outcome;
pub mod pool;
pub mod strategy;
pub mod telemetry;

pub use context::{ExecutionContext, Properties, PropertyKey};
pub use error::{BoxError, ConfigError, ExecutionError};
#[cfg(feature = "metrics")]
pub use listeners::MeteringListener;
pub use listeners::TracingListener;
pub use outcome::{Outcome, OutcomeKind};
pub use pool::ContextPool;
pub use strategy::{Operation, PassThrough, ResilienceStrategy, StrategyContext};
pub use telemetry::{
    EventKind, FnEnricher, FnListener, MeteringEnricher, Tag, TelemetryDispatcher, TelemetryEvent,
    TelemetryListener,
};
pub use tokio_util::sync::CancellationToken;
