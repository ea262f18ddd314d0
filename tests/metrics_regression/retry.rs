//! Retry metrics regression tests

use super::helpers::*;
use resilient_exec::{ExecutionContext, Outcome, ResiliencePipeline, RetryOptions};
use serial_test::serial;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

fn pipeline(name: &str, max_attempts: u32) -> ResiliencePipeline<u16, String> {
    ResiliencePipeline::builder()
        .add_retry(
            RetryOptions::builder()
                .name(name)
                .max_attempts(max_attempts)
                .constant_backoff(Duration::from_millis(10))
                .build()
                .unwrap(),
        )
        .build()
}

#[tokio::test]
#[serial]
async fn retry_metrics_exist() {
    init_recorder();

    let pipeline = pipeline("test_retry", 3);
    let calls = AtomicU32::new(0);

    // Fails twice, then succeeds
    let outcome = pipeline
        .execute(
            |_ctx, _: ()| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                let outcome = if n < 2 {
                    Outcome::from_error("failure".to_string())
                } else {
                    Outcome::from_result(200)
                };
                async move { outcome }
            },
            &ExecutionContext::new(),
            (),
        )
        .await;
    assert!(outcome.is_success());

    assert_counter_exists("retry_calls_total");
    assert_metric_has_label("retry_calls_total", "retry", "test_retry");
    assert_metric_has_label("retry_calls_total", "result", "succeeded");

    assert_counter_exists("retry_attempts_total");
    assert_metric_has_label("retry_attempts_total", "retry", "test_retry");

    assert_histogram_exists("retry_attempts");
    assert_metric_has_label("retry_attempts", "retry", "test_retry");
}

#[tokio::test]
#[serial]
async fn retry_exhausted_metrics() {
    init_recorder();

    let pipeline = pipeline("exhausted_retry", 2);
    pipeline
        .execute(
            |_ctx, _: ()| async { Outcome::from_error("always fails".to_string()) },
            &ExecutionContext::new(),
            (),
        )
        .await;

    assert_metric_has_label("retry_calls_total", "retry", "exhausted_retry");
    assert_metric_has_label("retry_calls_total", "result", "exhausted");
}

#[tokio::test]
#[serial]
async fn retry_unhandled_failure_metrics() {
    init_recorder();

    let pipeline = ResiliencePipeline::<u16, String>::builder()
        .add_retry(
            RetryOptions::builder()
                .name("unhandled_retry")
                .should_handle(|outcome: &Outcome<u16, String>| outcome.result() == Some(&429))
                .build()
                .unwrap(),
        )
        .build();
    pipeline
        .execute(
            |_ctx, _: ()| async { Outcome::from_error("fatal".to_string()) },
            &ExecutionContext::new(),
            (),
        )
        .await;

    assert_metric_has_label("retry_calls_total", "retry", "unhandled_retry");
    assert_metric_has_label("retry_calls_total", "result", "failed");
}

#[tokio::test]
#[serial]
async fn retry_cancelled_metrics() {
    init_recorder();

    let pipeline = pipeline("cancelled_retry", 3);
    let token = resilient_exec::CancellationToken::new();
    token.cancel();
    pipeline
        .execute(
            |_ctx, _: ()| async { Outcome::from_result(200) },
            &ExecutionContext::with_cancellation(token),
            (),
        )
        .await;

    assert_metric_has_label("retry_calls_total", "retry", "cancelled_retry");
    assert_metric_has_label("retry_calls_total", "result", "cancelled");
}
