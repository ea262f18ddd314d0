use resilient_exec_core::Outcome;
use std::fmt;
use std::sync::Arc;

/// Decides whether an outcome is a fault worth retrying.
///
/// Implemented for any `Fn(&Outcome<T, E>) -> bool` and for
/// [`FaultClassifier`]. Classification must be pure: the same outcome always
/// gets the same answer. The retry strategy never retries a cancelled
/// outcome, whatever the classifier says.
pub trait Classifier<T, E>: Send + Sync {
    /// Returns `true` if `outcome` should be retried.
    fn is_retriable(&self, outcome: &Outcome<T, E>) -> bool;
}

impl<T, E, F> Classifier<T, E> for F
where
    F: Fn(&Outcome<T, E>) -> bool + Send + Sync,
{
    fn is_retriable(&self, outcome: &Outcome<T, E>) -> bool {
        self(outcome)
    }
}

/// Predicate over successful results.
pub type ResultPredicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Predicate over operation errors.
pub type ErrorPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

enum ErrorHandling<E> {
    All,
    Matching(ErrorPredicate<E>),
    Never,
}

impl<E> Clone for ErrorHandling<E> {
    fn clone(&self) -> Self {
        match self {
            ErrorHandling::All => ErrorHandling::All,
            ErrorHandling::Matching(predicate) => ErrorHandling::Matching(Arc::clone(predicate)),
            ErrorHandling::Never => ErrorHandling::Never,
        }
    }
}

/// A classifier built from separate result and error predicates.
///
/// By default every operation error is retried and no successful result is.
///
/// ```
/// use resilient_exec_core::Outcome;
/// use resilient_exec_retry::{Classifier, FaultClassifier};
///
/// let classifier = FaultClassifier::<u16, String>::new()
///     .handle_result(|status| matches!(status, 408 | 429 | 504))
///     .ignore_errors();
///
/// assert!(classifier.is_retriable(&Outcome::from_result(429)));
/// assert!(!classifier.is_retriable(&Outcome::from_result(200)));
/// assert!(!classifier.is_retriable(&Outcome::from_error("boom".to_string())));
/// ```
pub struct FaultClassifier<T, E> {
    results: Option<ResultPredicate<T>>,
    errors: ErrorHandling<E>,
}

impl<T, E> FaultClassifier<T, E> {
    /// Creates a classifier that retries every error and no result.
    pub fn new() -> Self {
        Self {
            results: None,
            errors: ErrorHandling::All,
        }
    }

    /// Retries successful results matching `predicate`.
    pub fn handle_result<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.results = Some(Arc::new(predicate));
        self
    }

    /// Retries only errors matching `predicate`.
    pub fn handle_error<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.errors = ErrorHandling::Matching(Arc::new(predicate));
        self
    }

    /// Retries every operation error. The default.
    pub fn handle_all_errors(mut self) -> Self {
        self.errors = ErrorHandling::All;
        self
    }

    /// Never retries operation errors.
    pub fn ignore_errors(mut self) -> Self {
        self.errors = ErrorHandling::Never;
        self
    }
}

impl<T, E> Default for FaultClassifier<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Clone for FaultClassifier<T, E> {
    fn clone(&self) -> Self {
        Self {
            results: self.results.clone(),
            errors: self.errors.clone(),
        }
    }
}

impl<T, E> Classifier<T, E> for FaultClassifier<T, E> {
    fn is_retriable(&self, outcome: &Outcome<T, E>) -> bool {
        if outcome.is_cancelled() {
            return false;
        }
        if let Some(value) = outcome.result() {
            return self.results.as_ref().is_some_and(|predicate| predicate(value));
        }
        match (&self.errors, outcome.error()) {
            (ErrorHandling::All, _) => true,
            (ErrorHandling::Matching(predicate), Some(error)) => predicate(error),
            _ => false,
        }
    }
}

impl<T, E> fmt::Debug for FaultClassifier<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let errors = match self.errors {
            ErrorHandling::All => "all",
            ErrorHandling::Matching(_) => "matching",
            ErrorHandling::Never => "never",
        };
        f.debug_struct("FaultClassifier")
            .field("results", &self.results.is_some())
            .field("errors", &errors)
            .finish()
    }
}
