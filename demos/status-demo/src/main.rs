//! Status Demo
//!
//! Calls a flaky in-process endpoint that answers with a random HTTP status
//! and retries the transient ones (408, 429, 504) through a named resilience
//! pipeline.
//!
//! This example demonstrates:
//! 1. A retry pipeline with a status-based classifier and an `on_retry` report
//! 2. Request metadata passed to callbacks through the execution context
//! 3. Telemetry listeners and a metering enricher
//! 4. Retry settings loaded from a JSON file
//!
//! Run with:
//! ```sh
//! RUST_LOG=debug cargo run -p status-demo -- --requests 3 --wait-ms 200
//! ```

mod endpoint;
mod pipeline;

use clap::Parser;
use endpoint::{FlakyEndpoint, StatusRequest};
use pipeline::{AppSettings, StatusPipeline, PIPELINE_NAME, REQUEST};
use resilient_exec::{
    BoxError, CancellationToken, ContextPool, ExecutionError, Outcome, PipelineRegistry,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "status-demo", about = "Retry transient HTTP statuses from a flaky endpoint")]
struct Args {
    /// Number of requests to send
    #[arg(long, default_value_t = 3)]
    requests: u32,

    /// Time the endpoint waits before answering, in milliseconds
    #[arg(long, default_value_t = 1000)]
    wait_ms: u64,

    /// JSON file with a `RetryOptions` section
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Seed for the endpoint's random statuses
    #[arg(long)]
    seed: Option<u64>,

    /// Fraction of requests that fail without a status
    #[arg(long, default_value_t = 0.0)]
    error_rate: f64,
}

fn load_settings(path: Option<&PathBuf>) -> Result<AppSettings, BoxError> {
    match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&raw)?)
        }
        None => Ok(AppSettings::default()),
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let settings = load_settings(args.settings.as_ref())?;
    tracing::debug!(?settings, "retry settings loaded");

    let registry = PipelineRegistry::new();
    let pipeline: StatusPipeline = registry.get_or_try_add(PIPELINE_NAME, |_| {
        pipeline::build(&settings.retry_options)
    })?;

    let endpoint = FlakyEndpoint::new(args.seed).error_rate(args.error_rate);
    let pool = Arc::new(ContextPool::new());

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            println!("Cancelling...");
            signal.cancel();
        }
    });

    let request = StatusRequest::new(Duration::from_millis(args.wait_ms));
    for n in 1..=args.requests {
        println!("\n--- Request {n} of {} ---", args.requests);

        let context = pool.acquire(shutdown.child_token());
        let outcome = pipeline
            .execute(
                |ctx, (endpoint, request): (FlakyEndpoint, StatusRequest)| {
                    ctx.properties().set(REQUEST, request.uri());
                    async move { Outcome::from(endpoint.oneshot(request).await) }
                },
                &context,
                (endpoint.clone(), request.clone()),
            )
            .await;
        pool.release(context);

        match outcome.into_result() {
            Ok(status) => println!("Request result: {status}"),
            Err(ExecutionError::Operation(error)) => println!("Exception: {error}"),
            Err(ExecutionError::Cancelled) => {
                println!("Request cancelled");
                break;
            }
        }
    }

    Ok(())
}
