//! Property tests for the retry strategy.
//!
//! Invariants tested:
//! - Attempts never exceed max_attempts + 1
//! - Retrying stops at the first unhandled outcome
//! - Retry numbers passed to on_retry are 1, 2, ... with no gaps
//! - The terminal outcome is the last attempt's outcome

use proptest::prelude::*;
use resilient_exec::{ExecutionContext, Outcome, ResiliencePipeline, RetryOptions};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};

fn paused_runtime() -> Runtime {
    Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}

fn throttling_pipeline(
    max_attempts: u32,
    retries: Arc<Mutex<Vec<u32>>>,
) -> ResiliencePipeline<u16, String> {
    ResiliencePipeline::builder()
        .add_retry(
            RetryOptions::builder()
                .max_attempts(max_attempts)
                .constant_backoff(Duration::from_millis(10))
                .should_handle(|outcome: &Outcome<u16, String>| outcome.result() == Some(&429))
                .on_retry(move |args| retries.lock().unwrap().push(args.attempt))
                .build()
                .unwrap(),
        )
        .build()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: an always-failing operation runs exactly max_attempts + 1 times
    #[test]
    fn attempts_are_bounded(max_attempts in 0u32..=10) {
        paused_runtime().block_on(async {
            let retries = Arc::new(Mutex::new(Vec::new()));
            let pipeline = throttling_pipeline(max_attempts, Arc::clone(&retries));
            let calls = AtomicU32::new(0);

            let outcome = pipeline
                .execute(
                    |_ctx, _: ()| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        async { Outcome::from_result(429) }
                    },
                    &ExecutionContext::new(),
                    (),
                )
                .await;

            prop_assert_eq!(outcome, Outcome::Success(429));
            prop_assert_eq!(calls.load(Ordering::SeqCst), max_attempts + 1);
            let expected: Vec<u32> = (1..=max_attempts).collect();
            prop_assert_eq!(retries.lock().unwrap().clone(), expected);
            Ok(())
        })?;
    }

    /// Property: the first unhandled status ends the execution
    #[test]
    fn first_good_status_stops_retrying(
        max_attempts in 1u32..=8,
        failures in 0u32..=8,
        status in prop::sample::select(vec![200u16, 201, 404, 500]),
    ) {
        paused_runtime().block_on(async {
            let retries = Arc::new(Mutex::new(Vec::new()));
            let pipeline = throttling_pipeline(max_attempts, Arc::clone(&retries));
            let calls = AtomicU32::new(0);

            let outcome = pipeline
                .execute(
                    |_ctx, _: ()| {
                        let n = calls.fetch_add(1, Ordering::SeqCst);
                        async move { Outcome::from_result(if n < failures { 429 } else { status }) }
                    },
                    &ExecutionContext::new(),
                    (),
                )
                .await;

            let total = calls.load(Ordering::SeqCst);
            prop_assert!(total >= 1 && total <= max_attempts + 1);
            if failures <= max_attempts {
                prop_assert_eq!(outcome, Outcome::Success(status));
                prop_assert_eq!(total, failures + 1);
            } else {
                prop_assert_eq!(outcome, Outcome::Success(429));
                prop_assert_eq!(total, max_attempts + 1);
            }
            prop_assert_eq!(retries.lock().unwrap().len() as u32, total - 1);
            Ok(())
        })?;
    }

    /// Property: unhandled errors are never retried
    #[test]
    fn unhandled_errors_run_once(max_attempts in 0u32..=10) {
        paused_runtime().block_on(async {
            let pipeline = throttling_pipeline(max_attempts, Arc::new(Mutex::new(Vec::new())));
            let calls = AtomicU32::new(0);

            let outcome = pipeline
                .execute(
                    |_ctx, _: ()| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        async { Outcome::from_error("fatal".to_string()) }
                    },
                    &ExecutionContext::new(),
                    (),
                )
                .await;

            prop_assert!(!outcome.is_success());
            prop_assert_eq!(calls.load(Ordering::SeqCst), 1);
            Ok(())
        })?;
    }
}
