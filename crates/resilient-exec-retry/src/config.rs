use crate::backoff::{BackoffKind, IntervalFunction, Jitter, NoJitter, StandardBackoff};
use crate::classifier::{Classifier, FaultClassifier};
use resilient_exec_core::{ConfigError, ExecutionContext, Outcome};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Largest accepted `max_attempts`.
pub const MAX_ATTEMPTS_LIMIT: u32 = i32::MAX as u32;

/// What an `on_retry` callback is told about the retry being scheduled.
#[derive(Debug)]
pub struct OnRetryArguments<'a, T, E> {
    /// Retry number, starting at 1 for the first retry.
    pub attempt: u32,
    /// Delay that will be waited before the retry.
    pub delay: Duration,
    /// Duration of the attempt that triggered the retry.
    pub duration: Duration,
    /// Outcome of the attempt that triggered the retry.
    pub outcome: &'a Outcome<T, E>,
    /// The execution's context.
    pub context: &'a ExecutionContext,
}

/// Input to a custom delay generator.
#[derive(Debug)]
pub struct DelayArguments<'a, T, E> {
    /// Retry number, starting at 1 for the first retry.
    pub attempt: u32,
    /// Delay computed from the backoff curve, cap and jitter.
    pub computed: Duration,
    /// Outcome of the attempt that triggered the retry.
    pub outcome: &'a Outcome<T, E>,
    /// The execution's context.
    pub context: &'a ExecutionContext,
}

/// Callback invoked before each retry.
pub type OnRetry<T, E> = Arc<dyn Fn(&OnRetryArguments<'_, T, E>) + Send + Sync>;

/// Outcome-aware delay override. `None` keeps the computed delay.
pub type DelayGenerator<T, E> =
    Arc<dyn Fn(&DelayArguments<'_, T, E>) -> Option<Duration> + Send + Sync>;

/// Validated configuration for a [`RetryStrategy`](crate::RetryStrategy).
pub struct RetryOptions<T, E> {
    pub(crate) max_attempts: u32,
    pub(crate) interval: Arc<dyn IntervalFunction>,
    pub(crate) max_delay: Option<Duration>,
    pub(crate) jitter: Arc<dyn Jitter>,
    pub(crate) delay_generator: Option<DelayGenerator<T, E>>,
    pub(crate) classifier: Arc<dyn Classifier<T, E>>,
    pub(crate) on_retry: Vec<OnRetry<T, E>>,
    pub(crate) name: String,
}

impl<T, E> RetryOptions<T, E> {
    /// Creates a new builder.
    pub fn builder() -> RetryOptionsBuilder<T, E>
    where
        T: 'static,
        E: 'static,
    {
        RetryOptionsBuilder::new()
    }

    /// Maximum number of retries after the initial attempt.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Name reported in telemetry.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the delay before retry number `attempt`.
    ///
    /// The backoff curve is capped by `max_delay`, then jittered, then
    /// offered to the delay generator, whose answer is capped again.
    pub fn delay_for(
        &self,
        attempt: u32,
        outcome: &Outcome<T, E>,
        context: &ExecutionContext,
    ) -> Duration {
        let computed = self
            .jitter
            .apply(self.cap(self.interval.next_interval(attempt)));
        let Some(generator) = &self.delay_generator else {
            return computed;
        };
        let generated = generator(&DelayArguments {
            attempt,
            computed,
            outcome,
            context,
        });
        generated.map_or(computed, |delay| self.cap(delay))
    }

    fn cap(&self, delay: Duration) -> Duration {
        match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        }
    }
}

impl<T, E> Clone for RetryOptions<T, E> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            interval: Arc::clone(&self.interval),
            max_delay: self.max_delay,
            jitter: Arc::clone(&self.jitter),
            delay_generator: self.delay_generator.clone(),
            classifier: Arc::clone(&self.classifier),
            on_retry: self.on_retry.clone(),
            name: self.name.clone(),
        }
    }
}

impl<T, E> fmt::Debug for RetryOptions<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("name", &self.name)
            .field("max_attempts", &self.max_attempts)
            .field("max_delay", &self.max_delay)
            .field("on_retry", &self.on_retry.len())
            .finish_non_exhaustive()
    }
}

/// Builder for [`RetryOptions`].
pub struct RetryOptionsBuilder<T, E> {
    max_attempts: u32,
    backoff: BackoffKind,
    base_delay: Duration,
    max_delay: Option<Duration>,
    interval: Option<Arc<dyn IntervalFunction>>,
    jitter: Arc<dyn Jitter>,
    delay_generator: Option<DelayGenerator<T, E>>,
    classifier: Arc<dyn Classifier<T, E>>,
    on_retry: Vec<OnRetry<T, E>>,
    name: String,
}

impl<T, E> fmt::Debug for RetryOptionsBuilder<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptionsBuilder")
            .field("name", &self.name)
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("on_retry", &self.on_retry.len())
            .finish_non_exhaustive()
    }
}

impl<T: 'static, E: 'static> Default for RetryOptionsBuilder<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static, E: 'static> RetryOptionsBuilder<T, E> {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - max_attempts: 3
    /// - backoff: constant, 2s base delay, no cap
    /// - jitter: none
    /// - should_handle: every operation error, no successful result
    /// - name: `"Retry"`
    pub fn new() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffKind::Constant,
            base_delay: Duration::from_secs(2),
            max_delay: None,
            interval: None,
            jitter: Arc::new(NoJitter),
            delay_generator: None,
            classifier: Arc::new(FaultClassifier::new()),
            on_retry: Vec::new(),
            name: "Retry".to_string(),
        }
    }
}

impl<T, E> RetryOptionsBuilder<T, E> {
    /// Sets the maximum number of retries.
    ///
    /// This excludes the initial attempt, so max_attempts=3 means
    /// 1 initial attempt + up to 3 retries. Zero disables retrying.
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the backoff curve.
    pub fn backoff(mut self, kind: BackoffKind) -> Self {
        self.backoff = kind;
        self
    }

    /// Sets the base delay the backoff curve grows from.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets a constant backoff of `delay`.
    pub fn constant_backoff(self, delay: Duration) -> Self {
        self.backoff(BackoffKind::Constant).base_delay(delay)
    }

    /// Sets a linear backoff growing by `delay` per retry.
    pub fn linear_backoff(self, delay: Duration) -> Self {
        self.backoff(BackoffKind::Linear).base_delay(delay)
    }

    /// Sets an exponential backoff starting at `delay`.
    pub fn exponential_backoff(self, delay: Duration) -> Self {
        self.backoff(BackoffKind::Exponential).base_delay(delay)
    }

    /// Caps every delay, computed or generated.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    /// Replaces the backoff curve with a custom interval function.
    pub fn interval<I>(mut self, interval: I) -> Self
    where
        I: IntervalFunction + 'static,
    {
        self.interval = Some(Arc::new(interval));
        self
    }

    /// Sets the jitter applied after the cap.
    pub fn jitter<J>(mut self, jitter: J) -> Self
    where
        J: Jitter + 'static,
    {
        self.jitter = Arc::new(jitter);
        self
    }

    /// Overrides delays based on the triggering outcome.
    ///
    /// # Example
    /// ```rust
    /// use resilient_exec_retry::RetryOptions;
    /// use std::time::Duration;
    ///
    /// // Honour a server-provided back-off hint carried in the result.
    /// let options = RetryOptions::<(u16, Option<u64>), String>::builder()
    ///     .delay_generator(|args| {
    ///         args.outcome.result().and_then(|(_, hint)| hint.map(Duration::from_secs))
    ///     })
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(options.max_attempts(), 3);
    /// ```
    pub fn delay_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn(&DelayArguments<'_, T, E>) -> Option<Duration> + Send + Sync + 'static,
    {
        self.delay_generator = Some(Arc::new(generator));
        self
    }

    /// Sets the classifier deciding which outcomes are retried.
    pub fn should_handle<C>(mut self, classifier: C) -> Self
    where
        C: Classifier<T, E> + 'static,
    {
        self.classifier = Arc::new(classifier);
        self
    }

    /// Registers a callback invoked before each retry delay begins.
    ///
    /// Callbacks run in registration order. A panicking callback is logged
    /// and does not affect the execution.
    ///
    /// # Example
    /// ```rust,no_run
    /// use resilient_exec_retry::RetryOptions;
    /// use std::time::Duration;
    ///
    /// let options = RetryOptions::<u16, String>::builder()
    ///     .max_attempts(3)
    ///     .constant_backoff(Duration::from_secs(1))
    ///     .on_retry(|args| {
    ///         println!("Retry #{} after {:?}", args.attempt, args.delay);
    ///     })
    ///     .build()
    ///     .expect("valid retry options");
    /// ```
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(&OnRetryArguments<'_, T, E>) + Send + Sync + 'static,
    {
        self.on_retry.push(Arc::new(f));
        self
    }

    /// Sets the name for this retry instance (used in telemetry and metrics).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Validates the configuration.
    pub fn build(self) -> Result<RetryOptions<T, E>, ConfigError> {
        if self.max_attempts > MAX_ATTEMPTS_LIMIT {
            return Err(ConfigError::TooManyAttempts {
                got: u64::from(self.max_attempts),
                max: MAX_ATTEMPTS_LIMIT,
            });
        }
        if let Some(max_delay) = self.max_delay {
            if max_delay < self.base_delay {
                return Err(ConfigError::MaxDelayBelowBase {
                    base_delay: self.base_delay,
                    max_delay,
                });
            }
        }

        let interval = match self.interval {
            Some(interval) => interval,
            None => Arc::new(StandardBackoff::new(self.backoff, self.base_delay)),
        };

        Ok(RetryOptions {
            max_attempts: self.max_attempts,
            interval,
            max_delay: self.max_delay,
            jitter: self.jitter,
            delay_generator: self.delay_generator,
            classifier: self.classifier,
            on_retry: self.on_retry,
            name: self.name,
        })
    }
}
