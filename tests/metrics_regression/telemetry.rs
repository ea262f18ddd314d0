//! Telemetry metrics regression tests

use super::helpers::*;
use resilient_exec::{
    ExecutionContext, FnEnricher, MeteringListener, Outcome, ResiliencePipeline, RetryOptions, Tag,
    TelemetryEvent,
};
use serial_test::serial;
use std::time::Duration;

#[tokio::test]
#[serial]
async fn pipeline_events_are_metered() {
    init_recorder();

    let pipeline = ResiliencePipeline::<u16, String>::builder()
        .name("metered_pipeline")
        .add_retry(
            RetryOptions::builder()
                .name("metered_retry")
                .max_attempts(1)
                .constant_backoff(Duration::from_millis(10))
                .build()
                .unwrap(),
        )
        .add_enricher(FnEnricher::new(|_: &TelemetryEvent<'_>, tags: &mut Vec<Tag>| {
            tags.push(Tag::new("custom-tag", "custom-value"));
        }))
        .add_listener(MeteringListener::new())
        .build();

    pipeline
        .execute(
            |_ctx, _: ()| async { Outcome::from_error("down".to_string()) },
            &ExecutionContext::new(),
            (),
        )
        .await;

    assert_counter_exists("resilience_events_total");
    assert_metric_described("resilience_events_total");
    assert_metric_has_label("resilience_events_total", "pipeline", "metered_pipeline");
    assert_metric_has_label("resilience_events_total", "strategy", "metered_retry");
    assert_metric_has_label("resilience_events_total", "event", "PipelineExecuting");
    assert_metric_has_label("resilience_events_total", "event", "ExecutionAttempt");
    assert_metric_has_label("resilience_events_total", "event", "OnRetry");
    assert_metric_has_label("resilience_events_total", "event", "PipelineExecuted");
    assert_metric_has_label("resilience_events_total", "outcome", "failure");
    assert_metric_has_label("resilience_events_total", "custom-tag", "custom-value");

    assert_histogram_exists("resilience_attempt_duration_seconds");
    assert_metric_described("resilience_attempt_duration_seconds");
    assert_metric_has_label("resilience_attempt_duration_seconds", "pipeline", "metered_pipeline");
}
