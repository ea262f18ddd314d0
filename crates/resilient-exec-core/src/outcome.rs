//! The uniform result container passed between operations, strategies and observers.

use crate::error::ExecutionError;

/// The completed result of an operation: either a success value or a failure.
///
/// An outcome always holds exactly one of the two. Strategies classify it,
/// observers inspect it, and the pipeline hands the terminal one back to the
/// caller untouched.
///
/// # Examples
///
/// ```
/// use resilient_exec_core::Outcome;
///
/// let ok: Outcome<u16, String> = Outcome::from_result(200);
/// assert!(ok.is_success());
/// assert_eq!(ok.result(), Some(&200));
///
/// let failed: Outcome<u16, String> = Outcome::from_error("connection reset".to_string());
/// assert!(failed.result().is_none());
/// assert!(failed.into_result().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T, E> {
    /// The operation produced a value.
    Success(T),
    /// The operation failed or the execution was cancelled.
    Failure(ExecutionError<E>),
}

/// The variant of an outcome without its payload, used by telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeKind {
    /// A success value.
    Success,
    /// An error produced by the operation.
    Failure,
    /// The execution was cancelled.
    Cancelled,
}

impl OutcomeKind {
    /// Returns a stable lowercase label for logs and metric tags.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeKind::Success => "success",
            OutcomeKind::Failure => "failure",
            OutcomeKind::Cancelled => "cancelled",
        }
    }
}

impl<T, E> Outcome<T, E> {
    /// Creates a successful outcome.
    pub fn from_result(value: T) -> Self {
        Outcome::Success(value)
    }

    /// Creates an outcome holding an operation error.
    pub fn from_error(error: E) -> Self {
        Outcome::Failure(ExecutionError::Operation(error))
    }

    /// Creates a cancellation outcome.
    pub fn cancelled() -> Self {
        Outcome::Failure(ExecutionError::Cancelled)
    }

    /// Returns `true` if the outcome holds a success value.
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Returns `true` if the execution was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Failure(ExecutionError::Cancelled))
    }

    /// Returns the variant of this outcome.
    pub fn kind(&self) -> OutcomeKind {
        match self {
            Outcome::Success(_) => OutcomeKind::Success,
            Outcome::Failure(ExecutionError::Operation(_)) => OutcomeKind::Failure,
            Outcome::Failure(ExecutionError::Cancelled) => OutcomeKind::Cancelled,
        }
    }

    /// Returns the success value, if any.
    pub fn result(&self) -> Option<&T> {
        match self {
            Outcome::Success(value) => Some(value),
            Outcome::Failure(_) => None,
        }
    }

    /// Returns the failure, if any.
    pub fn failure(&self) -> Option<&ExecutionError<E>> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure(err) => Some(err),
        }
    }

    /// Returns the operation error, if the outcome holds one.
    pub fn error(&self) -> Option<&E> {
        self.failure().and_then(ExecutionError::operation_error)
    }

    /// Converts the outcome into a `Result`.
    pub fn into_result(self) -> Result<T, ExecutionError<E>> {
        match self {
            Outcome::Success(value) => Ok(value),
            Outcome::Failure(err) => Err(err),
        }
    }

    /// Maps the success value, leaving failures untouched.
    pub fn map<U, F>(self, f: F) -> Outcome<U, E>
    where
        F: FnOnce(T) -> U,
    {
        match self {
            Outcome::Success(value) => Outcome::Success(f(value)),
            Outcome::Failure(err) => Outcome::Failure(err),
        }
    }

    /// Borrows the payload of this outcome.
    pub fn as_ref(&self) -> Outcome<&T, &E> {
        match self {
            Outcome::Success(value) => Outcome::Success(value),
            Outcome::Failure(ExecutionError::Operation(e)) => {
                Outcome::Failure(ExecutionError::Operation(e))
            }
            Outcome::Failure(ExecutionError::Cancelled) => Outcome::cancelled(),
        }
    }
}

impl<T, E> From<Result<T, E>> for Outcome<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Outcome::from_result(value),
            Err(error) => Outcome::from_error(error),
        }
    }
}
