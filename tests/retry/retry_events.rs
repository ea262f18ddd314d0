//! Retry callbacks and telemetry event tests.

use resilient_exec::{
    EventKind, ExecutionContext, FnEnricher, FnListener, Outcome, PropertyKey, ResiliencePipeline,
    RetryOptions, Tag, TelemetryEvent,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const REQUEST: PropertyKey<String> = PropertyKey::new("request");

fn throttled(outcome: &Outcome<u16, String>) -> bool {
    outcome.result() == Some(&429)
}

#[tokio::test(start_paused = true)]
async fn on_retry_sees_request_status_and_delay() {
    let messages = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&messages);
    let pipeline = ResiliencePipeline::<u16, String>::builder()
        .add_retry(
            RetryOptions::builder()
                .max_attempts(2)
                .linear_backoff(Duration::from_millis(100))
                .should_handle(throttled)
                .on_retry(move |args| {
                    let request = args.context.properties().get(REQUEST).unwrap_or_default();
                    let status = args.outcome.result().copied().unwrap_or_default();
                    sink.lock().unwrap().push(format!(
                        "Request {request} failed, StatusCode={status}. Retry #{}. Waiting {:?}",
                        args.attempt, args.delay
                    ));
                })
                .build()
                .unwrap(),
        )
        .build();
    let ctx = ExecutionContext::new();

    let outcome = pipeline
        .execute(
            |ctx, uri: String| {
                ctx.properties().set(REQUEST, uri);
                async { Outcome::from_result(429) }
            },
            &ctx,
            "/test/1000".to_string(),
        )
        .await;

    assert_eq!(outcome, Outcome::Success(429));
    assert_eq!(
        *messages.lock().unwrap(),
        vec![
            "Request /test/1000 failed, StatusCode=429. Retry #1. Waiting 100ms".to_string(),
            "Request /test/1000 failed, StatusCode=429. Retry #2. Waiting 200ms".to_string(),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn on_retry_callbacks_run_in_order() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let first = Arc::clone(&order);
    let second = Arc::clone(&order);
    let pipeline = ResiliencePipeline::<u16, String>::builder()
        .add_retry(
            RetryOptions::builder()
                .max_attempts(1)
                .constant_backoff(Duration::from_millis(10))
                .should_handle(throttled)
                .on_retry(move |args| first.lock().unwrap().push(("first", args.attempt)))
                .on_retry(move |args| second.lock().unwrap().push(("second", args.attempt)))
                .build()
                .unwrap(),
        )
        .build();

    pipeline
        .execute(
            |_ctx, _: ()| async { Outcome::from_result(429) },
            &ExecutionContext::new(),
            (),
        )
        .await;

    assert_eq!(*order.lock().unwrap(), vec![("first", 1), ("second", 1)]);
}

#[tokio::test(start_paused = true)]
async fn panicking_on_retry_does_not_break_execution() {
    let after = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&after);
    let pipeline = ResiliencePipeline::<u16, String>::builder()
        .add_retry(
            RetryOptions::builder()
                .max_attempts(2)
                .constant_backoff(Duration::from_millis(10))
                .should_handle(throttled)
                .on_retry(|_| panic!("callback failure"))
                .on_retry(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
                .build()
                .unwrap(),
        )
        .build();
    let calls = AtomicU32::new(0);

    let outcome = pipeline
        .execute(
            |_ctx, _: ()| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Outcome::from_result(if n == 0 { 429 } else { 200 }) }
            },
            &ExecutionContext::new(),
            (),
        )
        .await;

    assert_eq!(outcome, Outcome::Success(200));
    assert_eq!(after.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn events_follow_execution_order() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let pipeline = ResiliencePipeline::<u16, String>::builder()
        .name("test-pipeline")
        .add_retry(
            RetryOptions::builder()
                .name("status-retry")
                .max_attempts(3)
                .constant_backoff(Duration::from_millis(1000))
                .should_handle(throttled)
                .build()
                .unwrap(),
        )
        .add_listener(FnListener::new(move |event: &TelemetryEvent<'_>| {
            sink.lock().unwrap().push((
                event.kind,
                event.attempt,
                event.handled,
                event.retry_delay,
                event.pipeline.to_string(),
            ));
        }))
        .build();
    let calls = AtomicU32::new(0);

    pipeline
        .execute(
            |_ctx, _: ()| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Outcome::from_result(if n < 2 { 429 } else { 200 }) }
            },
            &ExecutionContext::new(),
            (),
        )
        .await;

    let events = events.lock().unwrap();
    let kinds: Vec<_> = events.iter().map(|e| (e.0, e.1, e.2)).collect();
    assert_eq!(
        kinds,
        vec![
            (EventKind::PipelineExecuting, 0, false),
            (EventKind::ExecutionAttempt, 0, true),
            (EventKind::OnRetry, 1, true),
            (EventKind::ExecutionAttempt, 1, true),
            (EventKind::OnRetry, 2, true),
            (EventKind::ExecutionAttempt, 2, false),
            (EventKind::PipelineExecuted, 2, false),
        ]
    );
    assert_eq!(events[2].3, Some(Duration::from_millis(1000)));
    assert!(events.iter().all(|e| e.4 == "test-pipeline"));
}

#[tokio::test(start_paused = true)]
async fn attempt_events_carry_duration_and_outcome() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let pipeline = ResiliencePipeline::<u16, String>::builder()
        .add_retry(
            RetryOptions::builder()
                .max_attempts(1)
                .constant_backoff(Duration::from_millis(10))
                .should_handle(throttled)
                .build()
                .unwrap(),
        )
        .add_listener(FnListener::new(move |event: &TelemetryEvent<'_>| {
            if event.kind == EventKind::ExecutionAttempt {
                let status = event
                    .outcome_as::<u16, String>()
                    .and_then(|outcome| outcome.result().copied());
                sink.lock().unwrap().push((event.duration, status));
            }
        }))
        .build();

    pipeline
        .execute(
            |_ctx, _: ()| async {
                tokio::time::sleep(Duration::from_millis(250)).await;
                Outcome::from_result(429)
            },
            &ExecutionContext::new(),
            (),
        )
        .await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    for (duration, status) in seen.iter() {
        assert!(*duration >= Duration::from_millis(250));
        assert_eq!(*status, Some(429));
    }
}

#[tokio::test(start_paused = true)]
async fn enrichers_tag_every_event() {
    let tagged = Arc::new(AtomicU32::new(0));
    let total = Arc::new(AtomicU32::new(0));
    let (t, n) = (Arc::clone(&tagged), Arc::clone(&total));
    let pipeline = ResiliencePipeline::<u16, String>::builder()
        .add_retry(
            RetryOptions::builder()
                .max_attempts(1)
                .constant_backoff(Duration::from_millis(10))
                .should_handle(throttled)
                .build()
                .unwrap(),
        )
        .add_enricher(FnEnricher::new(|_event: &TelemetryEvent<'_>, tags: &mut Vec<Tag>| {
            tags.push(Tag::new("custom-tag", "custom-value"));
        }))
        .add_listener(FnListener::new(move |event: &TelemetryEvent<'_>| {
            n.fetch_add(1, Ordering::SeqCst);
            if event.tag("custom-tag") == Some("custom-value") {
                t.fetch_add(1, Ordering::SeqCst);
            }
        }))
        .build();

    pipeline
        .execute(
            |_ctx, _: ()| async { Outcome::from_result(429) },
            &ExecutionContext::new(),
            (),
        )
        .await;

    // executing, 2 attempts, 1 retry, executed
    assert_eq!(total.load(Ordering::SeqCst), 5);
    assert_eq!(tagged.load(Ordering::SeqCst), 5);
}

#[tokio::test(start_paused = true)]
async fn panicking_listener_does_not_affect_outcome() {
    let pipeline = ResiliencePipeline::<u16, String>::builder()
        .add_retry(
            RetryOptions::builder()
                .max_attempts(1)
                .constant_backoff(Duration::from_millis(10))
                .should_handle(throttled)
                .build()
                .unwrap(),
        )
        .add_listener(FnListener::new(|_event: &TelemetryEvent<'_>| panic!("listener failure")))
        .build();

    let outcome = pipeline
        .execute(
            |_ctx, _: ()| async { Outcome::from_result(200) },
            &ExecutionContext::new(),
            (),
        )
        .await;

    assert_eq!(outcome, Outcome::Success(200));
}
