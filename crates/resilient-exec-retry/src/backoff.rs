use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

/// How the delay grows between retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BackoffKind {
    /// The same delay before every retry.
    #[default]
    Constant,
    /// `base * n` before the n-th retry.
    Linear,
    /// `base * 2^(n-1)` before the n-th retry.
    Exponential,
}

/// Computes the delay before retry number `attempt` (1 for the first retry).
///
/// Arithmetic saturates at [`Duration::MAX`]. An `attempt` of 0 is treated
/// like the first retry for exponential growth and yields zero for linear.
///
/// ```
/// use resilient_exec_retry::{compute_delay, BackoffKind};
/// use std::time::Duration;
///
/// let base = Duration::from_millis(100);
/// assert_eq!(compute_delay(BackoffKind::Constant, base, 3), base);
/// assert_eq!(compute_delay(BackoffKind::Linear, base, 3), Duration::from_millis(300));
/// assert_eq!(compute_delay(BackoffKind::Exponential, base, 3), Duration::from_millis(400));
/// ```
pub fn compute_delay(kind: BackoffKind, base: Duration, attempt: u32) -> Duration {
    if base.is_zero() {
        return Duration::ZERO;
    }
    match kind {
        BackoffKind::Constant => base,
        BackoffKind::Linear => base.saturating_mul(attempt),
        BackoffKind::Exponential => 2u32
            .checked_pow(attempt.saturating_sub(1))
            .map_or(Duration::MAX, |factor| base.saturating_mul(factor)),
    }
}

/// Abstraction for computing retry intervals.
///
/// This trait allows for the built-in constant, linear and exponential
/// curves as well as custom implementations.
pub trait IntervalFunction: Send + Sync {
    /// Computes the delay before the next retry.
    ///
    /// # Arguments
    /// * `attempt` - The retry number (1-indexed, so the first retry is 1)
    fn next_interval(&self, attempt: u32) -> Duration;
}

/// One of the built-in backoff curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandardBackoff {
    kind: BackoffKind,
    base: Duration,
}

impl StandardBackoff {
    /// Creates a backoff of `kind` around `base`.
    pub fn new(kind: BackoffKind, base: Duration) -> Self {
        Self { kind, base }
    }

    /// Returns the curve.
    pub fn kind(&self) -> BackoffKind {
        self.kind
    }

    /// Returns the base delay.
    pub fn base(&self) -> Duration {
        self.base
    }
}

impl IntervalFunction for StandardBackoff {
    fn next_interval(&self, attempt: u32) -> Duration {
        compute_delay(self.kind, self.base, attempt)
    }
}

/// Function-based interval implementation.
pub struct FnInterval<F> {
    f: F,
}

impl<F> FnInterval<F>
where
    F: Fn(u32) -> Duration + Send + Sync,
{
    /// Creates a new function-based interval.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> IntervalFunction for FnInterval<F>
where
    F: Fn(u32) -> Duration + Send + Sync,
{
    fn next_interval(&self, attempt: u32) -> Duration {
        (self.f)(attempt)
    }
}

impl<F> fmt::Debug for FnInterval<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnInterval").finish_non_exhaustive()
    }
}

/// Randomizes a computed delay to spread out retries from many callers.
pub trait Jitter: Send + Sync {
    /// Returns the delay to actually wait.
    fn apply(&self, delay: Duration) -> Duration;
}

/// Leaves delays untouched. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoJitter;

impl Jitter for NoJitter {
    fn apply(&self, delay: Duration) -> Duration {
        delay
    }
}

/// Source of uniform samples in `[0, 1)`.
///
/// Thread-local unless seeded, in which case samples are reproducible.
#[derive(Debug, Default)]
struct Sampler {
    seeded: Option<Mutex<StdRng>>,
}

impl Sampler {
    fn seeded(seed: u64) -> Self {
        Self {
            seeded: Some(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }

    fn sample(&self) -> f64 {
        match &self.seeded {
            Some(rng) => rng
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .random::<f64>(),
            None => rand::rng().random::<f64>(),
        }
    }
}

/// Picks a delay uniformly in `[0, computed]`.
#[derive(Debug, Default)]
pub struct FullJitter {
    sampler: Sampler,
}

impl FullJitter {
    /// Creates a full jitter drawing from the thread-local generator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a full jitter with a deterministic sequence.
    pub fn seeded(seed: u64) -> Self {
        Self {
            sampler: Sampler::seeded(seed),
        }
    }
}

impl Jitter for FullJitter {
    fn apply(&self, delay: Duration) -> Duration {
        delay.mul_f64(self.sampler.sample())
    }
}

/// Spreads the delay by up to `factor` in either direction.
///
/// A factor of 0.5 yields delays between 50% and 150% of the computed value.
#[derive(Debug)]
pub struct ProportionalJitter {
    factor: f64,
    sampler: Sampler,
}

impl ProportionalJitter {
    /// Creates a proportional jitter. `factor` is clamped to `[0, 1]`.
    pub fn new(factor: f64) -> Self {
        Self {
            factor: factor.clamp(0.0, 1.0),
            sampler: Sampler::default(),
        }
    }

    /// Like [`new`](Self::new) with a deterministic sequence.
    pub fn seeded(factor: f64, seed: u64) -> Self {
        Self {
            factor: factor.clamp(0.0, 1.0),
            sampler: Sampler::seeded(seed),
        }
    }
}

impl Jitter for ProportionalJitter {
    fn apply(&self, delay: Duration) -> Duration {
        // Maps [0, 1) onto [1 - factor, 1 + factor).
        let scale = 1.0 - self.factor + 2.0 * self.factor * self.sampler.sample();
        Duration::try_from_secs_f64(delay.as_secs_f64() * scale).unwrap_or(Duration::MAX)
    }
}
