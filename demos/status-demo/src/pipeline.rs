//! The retry pipeline wrapped around the status endpoint.

use crate::endpoint::{EndpointError, StatusCode};
use resilient_exec::{
    ConfigError, EventKind, FnEnricher, FnListener, Outcome, PropertyKey, ResiliencePipeline,
    RetryOptions, RetrySettings, Tag, TelemetryEvent, TracingListener,
};
use serde::Deserialize;
use std::time::Duration;

/// The request being executed, stored by the operation for the retry callback.
pub const REQUEST: PropertyKey<String> = PropertyKey::new("request");

/// Name the pipeline is registered under.
pub const PIPELINE_NAME: &str = "test-pipeline";

pub type StatusPipeline = ResiliencePipeline<StatusCode, EndpointError>;

/// Contents of the optional settings file.
#[derive(Debug, Default, Deserialize)]
pub struct AppSettings {
    #[serde(default, alias = "RetryOptions")]
    pub retry_options: RetrySettings,
}

/// Retries responses with a transient status. Transport failures carry no
/// status and are not retried.
pub fn should_handle(outcome: &Outcome<StatusCode, EndpointError>) -> bool {
    outcome.result().is_some_and(|status| status.is_transient())
}

fn report_attempt_duration(event: &TelemetryEvent<'_>) {
    if event.kind == EventKind::ExecutionAttempt {
        println!(
            "Attempt #{}, execution duration is {:?}",
            event.attempt, event.duration
        );
    }
}

fn add_custom_tag(_event: &TelemetryEvent<'_>, tags: &mut Vec<Tag>) {
    tags.push(Tag::new("custom-tag", "custom-value"));
}

/// Builds the pipeline: constant 1s backoff and 3 retries unless `settings`
/// say otherwise.
pub fn build(settings: &RetrySettings) -> Result<StatusPipeline, ConfigError> {
    let options = settings
        .apply(
            RetryOptions::<StatusCode, EndpointError>::builder()
                .name("status-retry")
                .max_attempts(3)
                .constant_backoff(Duration::from_millis(1000)),
        )?
        .should_handle(should_handle)
        .on_retry(|args| {
            let request = args.context.properties().get(REQUEST).unwrap_or_default();
            let status = args
                .outcome
                .result()
                .map_or_else(|| "none".to_string(), ToString::to_string);
            println!(
                "Request {request} failed, StatusCode={status}. Retry #{}. Waiting {:?} and try again.",
                args.attempt, args.delay
            );
        })
        .build()?;

    Ok(ResiliencePipeline::builder()
        .name(PIPELINE_NAME)
        .add_retry(options)
        .add_listener(TracingListener::new())
        .add_listener(FnListener::new(report_attempt_duration))
        .add_enricher(FnEnricher::new(add_custom_tag))
        .build())
}
