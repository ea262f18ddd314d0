//! Pooled execution contexts flowing through pipelines.

use resilient_exec::{
    CancellationToken, ContextPool, ExecutionContext, Outcome, PropertyKey, ResiliencePipeline,
    RetryOptions,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const REQUEST: PropertyKey<String> = PropertyKey::new("request");
const TENANT: PropertyKey<u32> = PropertyKey::new("tenant");

fn retry_pipeline() -> ResiliencePipeline<u16, String> {
    ResiliencePipeline::builder()
        .name("context-pipeline")
        .add_retry(
            RetryOptions::builder()
                .max_attempts(2)
                .constant_backoff(Duration::from_millis(100))
                .should_handle(|outcome: &Outcome<u16, String>| outcome.result() == Some(&429))
                .build()
                .unwrap(),
        )
        .build()
}

#[tokio::test(start_paused = true)]
async fn released_context_comes_back_clean() {
    let pipeline = retry_pipeline();
    let pool = ContextPool::new();

    let context = pool.acquire_with_key("first", CancellationToken::new());
    context.properties().set(TENANT, 7);
    pipeline
        .execute(
            |ctx, uri: String| {
                ctx.properties().set(REQUEST, uri);
                async { Outcome::from_result(429) }
            },
            &context,
            "/test/1".to_string(),
        )
        .await;
    assert_eq!(context.attempt(), 2);
    assert_eq!(context.operation_key(), Some("first"));
    pool.release(context);
    assert_eq!(pool.idle(), 1);

    let reused = pool.acquire(CancellationToken::new());
    assert_eq!(pool.idle(), 0);
    assert!(reused.properties().is_empty());
    assert_eq!(reused.properties().get(REQUEST), None);
    assert_eq!(reused.attempt(), 0);
    assert_eq!(reused.operation_key(), None);
    assert!(!reused.is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn properties_survive_across_attempts() {
    let pipeline = retry_pipeline();
    let context = ExecutionContext::new();
    context.properties().set(TENANT, 42);
    let seen = Mutex::new(Vec::new());

    pipeline
        .execute(
            |ctx, _: ()| {
                seen.lock().unwrap().push(ctx.properties().get(TENANT));
                async { Outcome::from_result(429) }
            },
            &context,
            (),
        )
        .await;

    assert_eq!(*seen.lock().unwrap(), vec![Some(42); 3]);
}

#[tokio::test(start_paused = true)]
async fn cancelled_parent_stops_pooled_children() {
    let pipeline = retry_pipeline();
    let pool = Arc::new(ContextPool::new());
    let shutdown = CancellationToken::new();

    let mut handles = Vec::new();
    for _ in 0..4 {
        let pipeline = pipeline.clone();
        let pool = Arc::clone(&pool);
        let token = shutdown.child_token();
        handles.push(tokio::spawn(async move {
            let context = pool.acquire(token);
            let outcome = pipeline
                .execute(|_ctx, _: ()| async { Outcome::from_result(429) }, &context, ())
                .await;
            pool.release(context);
            outcome
        }));
    }

    tokio::time::sleep(Duration::from_millis(150)).await;
    shutdown.cancel();

    for handle in handles {
        assert!(handle.await.unwrap().is_cancelled());
    }
    assert_eq!(pool.idle(), 4);
}

#[tokio::test]
async fn empty_pipeline_is_a_pass_through() {
    let pipeline = ResiliencePipeline::<u16, String>::empty();
    let outcome = pipeline
        .execute(
            |_ctx, _: ()| async { Outcome::from_error("boom".to_string()) },
            &ExecutionContext::new(),
            (),
        )
        .await;
    assert_eq!(outcome, Outcome::from_error("boom".to_string()));
    assert_eq!(pipeline.name(), resilient_exec::DEFAULT_PIPELINE_NAME);
}
