//! Error types shared by every resilient-exec strategy.
//!
//! Two kinds of error live here:
//!
//! - [`ExecutionError`] is the failure half of an [`Outcome`](crate::Outcome).
//!   It either wraps the error produced by the operation itself or marks the
//!   execution as cancelled. It is never raised out of a pipeline; callers
//!   receive it inside the terminal outcome.
//! - [`ConfigError`] is returned eagerly when a strategy is built from invalid
//!   options. Misconfiguration is the only thing rejected at construction time.
//!
//! # Pattern Matching
//!
//! ```rust
//! use resilient_exec_core::{ExecutionError, Outcome};
//!
//! fn describe(outcome: &Outcome<u16, std::io::Error>) -> String {
//!     match outcome {
//!         Outcome::Success(status) => format!("status {}", status),
//!         Outcome::Failure(ExecutionError::Operation(err)) => format!("failed: {}", err),
//!         Outcome::Failure(ExecutionError::Cancelled) => "cancelled".to_string(),
//!     }
//! }
//! ```

use std::time::Duration;
use thiserror::Error;

/// The failure half of an [`Outcome`](crate::Outcome).
///
/// # Type Parameters
///
/// - `E`: the error type produced by the wrapped operation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError<E> {
    /// The operation completed with an error.
    #[error("operation failed: {0}")]
    Operation(E),

    /// The execution observed its cancellation signal before completing.
    #[error("execution was cancelled")]
    Cancelled,
}

impl<E> ExecutionError<E> {
    /// Returns `true` if this failure came from the operation.
    pub fn is_operation(&self) -> bool {
        matches!(self, ExecutionError::Operation(_))
    }

    /// Returns `true` if the execution was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExecutionError::Cancelled)
    }

    /// Returns a reference to the operation error, if any.
    pub fn operation_error(&self) -> Option<&E> {
        match self {
            ExecutionError::Operation(e) => Some(e),
            ExecutionError::Cancelled => None,
        }
    }

    /// Extracts the operation error, if this is an `Operation` variant.
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            ExecutionError::Operation(e) => Some(e),
            ExecutionError::Cancelled => None,
        }
    }

    /// Maps the operation error using a function.
    ///
    /// # Examples
    ///
    /// ```
    /// use resilient_exec_core::ExecutionError;
    ///
    /// let err: ExecutionError<String> = ExecutionError::Operation("boom".to_string());
    /// let mapped: ExecutionError<usize> = err.map_operation(|s| s.len());
    /// assert_eq!(mapped.into_operation_error(), Some(4));
    /// ```
    pub fn map_operation<F, T>(self, f: F) -> ExecutionError<T>
    where
        F: FnOnce(E) -> T,
    {
        match self {
            ExecutionError::Operation(e) => ExecutionError::Operation(f(e)),
            ExecutionError::Cancelled => ExecutionError::Cancelled,
        }
    }
}

/// Errors raised while building a strategy from its options.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// `max_attempts` was negative.
    #[error("max_attempts must be >= 0 (got {0})")]
    NegativeMaxAttempts(i64),

    /// `max_attempts` exceeded the supported ceiling.
    #[error("max_attempts must be <= {max} (got {got})")]
    TooManyAttempts {
        /// The requested attempt count.
        got: u64,
        /// The largest accepted attempt count.
        max: u32,
    },

    /// The delay cap is smaller than the base delay.
    #[error("max_delay ({max_delay:?}) must not be smaller than base_delay ({base_delay:?})")]
    MaxDelayBelowBase {
        /// Configured base delay.
        base_delay: Duration,
        /// Configured delay cap.
        max_delay: Duration,
    },

    /// A loosely typed setting could not be interpreted.
    #[error("invalid setting `{name}`: {reason}")]
    InvalidSetting {
        /// Name of the offending setting.
        name: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

/// Boxed error type used where listeners or adapters need an erased error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
