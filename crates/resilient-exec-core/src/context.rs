//! Per-execution state carried from the caller, through the operation, into observers.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

/// A typed key into the [`Properties`] bag of an [`ExecutionContext`].
///
/// Keys are meant to be declared once and reused, so the operation that
/// writes a value and the observer that reads it agree on both the name and
/// the value type.
///
/// ```
/// use resilient_exec_core::PropertyKey;
///
/// const REQUEST_URI: PropertyKey<String> = PropertyKey::new("request-uri");
/// assert_eq!(REQUEST_URI.name(), "request-uri");
/// ```
pub struct PropertyKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> PropertyKey<T> {
    /// Creates a new key.
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// Returns the key name.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for PropertyKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for PropertyKey<T> {}

impl<T> fmt::Debug for PropertyKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PropertyKey").field(&self.name).finish()
    }
}

type Slot = Box<dyn Any + Send + Sync>;

/// Caller-defined metadata attached to one execution.
///
/// Written by the operation, read by retry callbacks and telemetry listeners
/// of the same execution. Values are stored under [`PropertyKey`]s; a value
/// stored under a name with a different type than the key asks for is
/// treated as absent.
#[derive(Default)]
pub struct Properties {
    slots: Mutex<HashMap<&'static str, Slot>>,
}

impl Properties {
    /// Creates an empty property bag.
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<&'static str, Slot>> {
        // Values are replaced atomically under the lock, so a poisoned map is still consistent.
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Stores a value, replacing any previous value under the same name.
    pub fn set<T>(&self, key: PropertyKey<T>, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.slots().insert(key.name, Box::new(value));
    }

    /// Returns a clone of the value stored under `key`.
    pub fn get<T>(&self, key: PropertyKey<T>) -> Option<T>
    where
        T: Clone + 'static,
    {
        self.with(key, T::clone)
    }

    /// Returns the stored value, or `default` when it is missing.
    pub fn get_or<T>(&self, key: PropertyKey<T>, default: T) -> T
    where
        T: Clone + 'static,
    {
        self.get(key).unwrap_or(default)
    }

    /// Runs `f` against the stored value without cloning it.
    pub fn with<T, R>(&self, key: PropertyKey<T>, f: impl FnOnce(&T) -> R) -> Option<R>
    where
        T: 'static,
    {
        let slots = self.slots();
        let value = slots.get(key.name).and_then(|slot| slot.downcast_ref::<T>());
        value.map(f)
    }

    /// Removes and returns the value stored under `key`.
    pub fn remove<T>(&self, key: PropertyKey<T>) -> Option<T>
    where
        T: 'static,
    {
        let mut slots = self.slots();
        match slots.remove(key.name)?.downcast::<T>() {
            Ok(value) => Some(*value),
            Err(other) => {
                // Wrong type: leave the slot as it was.
                slots.insert(key.name, other);
                None
            }
        }
    }

    /// Returns `true` if a value of the key's type is stored.
    pub fn contains<T>(&self, key: PropertyKey<T>) -> bool
    where
        T: 'static,
    {
        self.with(key, |_| ()).is_some()
    }

    /// Returns the number of stored values.
    pub fn len(&self) -> usize {
        self.slots().len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.slots().is_empty()
    }

    /// Removes every stored value.
    pub fn clear(&self) {
        self.slots().clear();
    }
}

impl fmt::Debug for Properties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.slots().keys()).finish()
    }
}

/// Mutable state for a single execution.
///
/// Contexts come from a [`ContextPool`](crate::ContextPool) and go back to it
/// once the execution finishes. Because a context is moved out of the pool
/// and borrowed by exactly one execution, it is never observed by two
/// executions at once.
#[derive(Debug, Default)]
pub struct ExecutionContext {
    cancellation: Option<CancellationToken>,
    attempt: AtomicU32,
    operation_key: Option<String>,
    properties: Properties,
}

impl ExecutionContext {
    /// Creates an unpooled context with no cancellation binding.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an unpooled context bound to `token`.
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            cancellation: Some(token),
            ..Self::default()
        }
    }

    pub(crate) fn bind(&mut self, operation_key: Option<String>, token: CancellationToken) {
        self.cancellation = Some(token);
        self.operation_key = operation_key;
        *self.attempt.get_mut() = 0;
    }

    pub(crate) fn reset(&mut self) {
        self.cancellation = None;
        self.operation_key = None;
        *self.attempt.get_mut() = 0;
        self.properties.clear();
    }

    /// Returns the bound cancellation token, if any.
    pub fn cancellation_token(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }

    /// Returns `true` if the bound token has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Completes when the bound token is cancelled; never completes when unbound.
    pub async fn cancelled(&self) {
        match &self.cancellation {
            Some(token) => token.cancelled().await,
            None => std::future::pending().await,
        }
    }

    /// The current attempt number: 0 for the initial try, 1 for the first retry.
    pub fn attempt(&self) -> u32 {
        self.attempt.load(Ordering::Relaxed)
    }

    /// Records the attempt about to run. Called by strategies.
    pub fn set_attempt(&self, attempt: u32) {
        self.attempt.store(attempt, Ordering::Relaxed);
    }

    /// Caller-supplied name of the operation, used as a telemetry tag.
    pub fn operation_key(&self) -> Option<&str> {
        self.operation_key.as_deref()
    }

    /// Sets the operation key on an unpooled context.
    pub fn set_operation_key(&mut self, key: impl Into<String>) {
        self.operation_key = Some(key.into());
    }

    /// The property bag for this execution.
    pub fn properties(&self) -> &Properties {
        &self.properties
    }
}
