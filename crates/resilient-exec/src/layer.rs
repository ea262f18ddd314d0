//! Tower adapter running every request through a [`ResiliencePipeline`].

use crate::pipeline::ResiliencePipeline;
use futures::future::BoxFuture;
use resilient_exec_core::{CancellationToken, ContextPool, ExecutionError, Outcome};
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service, ServiceExt};

/// A Tower [`Layer`] that executes requests through a pipeline.
///
/// Each request gets a context from the shared pool, bound to a child of
/// the layer's cancellation token, and hands it back when the pipeline
/// finishes. Cancelling the layer's token cancels every in-flight request.
///
/// # Examples
///
/// ```
/// use resilient_exec::{ContextPool, PipelineLayer, ResiliencePipeline, RetryOptions};
/// use std::sync::Arc;
/// use std::time::Duration;
/// use tower::ServiceBuilder;
///
/// # #[derive(Debug, Clone)]
/// # struct MyError;
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pipeline = ResiliencePipeline::<String, MyError>::builder()
///     .add_retry(
///         RetryOptions::builder()
///             .max_attempts(3)
///             .exponential_backoff(Duration::from_millis(100))
///             .build()?,
///     )
///     .build();
///
/// let service = ServiceBuilder::new()
///     .layer(PipelineLayer::new(pipeline, Arc::new(ContextPool::new())))
///     .service(tower::service_fn(|req: String| async move { Ok::<_, MyError>(req) }));
/// # Ok(())
/// # }
/// ```
pub struct PipelineLayer<T, E> {
    pipeline: ResiliencePipeline<T, E>,
    pool: Arc<ContextPool>,
    cancellation: CancellationToken,
}

impl<T, E> PipelineLayer<T, E> {
    /// Creates a layer that draws contexts from `pool`.
    pub fn new(pipeline: ResiliencePipeline<T, E>, pool: Arc<ContextPool>) -> Self {
        Self {
            pipeline,
            pool,
            cancellation: CancellationToken::new(),
        }
    }

    /// Binds every request to a child of `token`.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }
}

impl<T, E> Clone for PipelineLayer<T, E> {
    fn clone(&self) -> Self {
        Self {
            pipeline: self.pipeline.clone(),
            pool: Arc::clone(&self.pool),
            cancellation: self.cancellation.clone(),
        }
    }
}

impl<S, T, E> Layer<S> for PipelineLayer<T, E> {
    type Service = PipelineService<S, T, E>;

    fn layer(&self, service: S) -> Self::Service {
        PipelineService {
            inner: service,
            pipeline: self.pipeline.clone(),
            pool: Arc::clone(&self.pool),
            cancellation: self.cancellation.clone(),
        }
    }
}

/// A Tower [`Service`] that executes requests through a pipeline.
///
/// Every attempt calls a fresh clone of the inner service with a clone of
/// the request. Operation errors come back as [`ExecutionError::Operation`],
/// cancellation as [`ExecutionError::Cancelled`].
pub struct PipelineService<S, T, E> {
    inner: S,
    pipeline: ResiliencePipeline<T, E>,
    pool: Arc<ContextPool>,
    cancellation: CancellationToken,
}

impl<S: Clone, T, E> Clone for PipelineService<S, T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            pipeline: self.pipeline.clone(),
            pool: Arc::clone(&self.pool),
            cancellation: self.cancellation.clone(),
        }
    }
}

impl<S, Req, T, E> Service<Req> for PipelineService<S, T, E>
where
    S: Service<Req, Response = T, Error = E> + Clone + Send + 'static,
    S::Future: Send + 'static,
    Req: Clone + Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    type Response = T;
    type Error = ExecutionError<E>;
    type Future = BoxFuture<'static, Result<T, ExecutionError<E>>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Readiness is awaited per attempt on the clone that serves it.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let service = self.inner.clone();
        let pipeline = self.pipeline.clone();
        let pool = Arc::clone(&self.pool);
        let token = self.cancellation.child_token();

        Box::pin(async move {
            let context = pool.acquire(token);
            let outcome = pipeline
                .execute(
                    |_ctx, (service, req): (S, Req)| async move {
                        match service.oneshot(req).await {
                            Ok(response) => Outcome::from_result(response),
                            Err(error) => Outcome::from_error(error),
                        }
                    },
                    &context,
                    (service, req),
                )
                .await;
            pool.release(context);
            outcome.into_result()
        })
    }
}
