//! An in-process stand-in for a flaky HTTP endpoint.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

/// An HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusCode(pub u16);

impl StatusCode {
    pub const OK: StatusCode = StatusCode(200);
    pub const REQUEST_TIMEOUT: StatusCode = StatusCode(408);
    pub const TOO_MANY_REQUESTS: StatusCode = StatusCode(429);
    pub const INTERNAL_SERVER_ERROR: StatusCode = StatusCode(500);
    pub const GATEWAY_TIMEOUT: StatusCode = StatusCode(504);

    /// Statuses worth retrying: the server may answer differently next time.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS | StatusCode::GATEWAY_TIMEOUT
        )
    }

    fn reason(self) -> &'static str {
        match self.0 {
            200 => "OK",
            408 => "RequestTimeout",
            429 => "TooManyRequests",
            500 => "InternalServerError",
            504 => "GatewayTimeout",
            _ => "Unknown",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.reason(), self.0)
    }
}

/// Statuses the endpoint picks from.
pub const RESPONSES: [StatusCode; 5] = [
    StatusCode::OK,
    StatusCode::REQUEST_TIMEOUT,
    StatusCode::TOO_MANY_REQUESTS,
    StatusCode::INTERNAL_SERVER_ERROR,
    StatusCode::GATEWAY_TIMEOUT,
];

/// A request to `/test/{wait}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRequest {
    pub wait: Duration,
}

impl StatusRequest {
    pub fn new(wait: Duration) -> Self {
        Self { wait }
    }

    /// The request path, as a client would send it.
    pub fn uri(&self) -> String {
        format!("/test/{}", self.wait.as_millis())
    }
}

/// Transport-level failure: the request never produced a status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointError(String);

impl EndpointError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

impl fmt::Display for EndpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "endpoint error: {}", self.0)
    }
}

impl std::error::Error for EndpointError {}

/// Waits for the requested time, then answers with a random status.
///
/// With a non-zero `error_rate` some requests fail without a status, like a
/// dropped connection.
#[derive(Clone)]
pub struct FlakyEndpoint {
    rng: Arc<Mutex<StdRng>>,
    error_rate: f64,
}

impl FlakyEndpoint {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            rng: Arc::new(Mutex::new(rng)),
            error_rate: 0.0,
        }
    }

    pub fn error_rate(mut self, rate: f64) -> Self {
        self.error_rate = rate.clamp(0.0, 1.0);
        self
    }

    fn pick(&self) -> Result<StatusCode, EndpointError> {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        if rng.random_bool(self.error_rate) {
            return Err(EndpointError::new("connection reset"));
        }
        Ok(RESPONSES[rng.random_range(0..RESPONSES.len())])
    }
}

impl tower::Service<StatusRequest> for FlakyEndpoint {
    type Response = StatusCode;
    type Error = EndpointError;
    type Future = Pin<Box<dyn Future<Output = Result<StatusCode, EndpointError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: StatusRequest) -> Self::Future {
        let response = self.pick();
        Box::pin(async move {
            tokio::time::sleep(req.wait).await;
            response
        })
    }
}
