//! A shared pool of reusable [`ExecutionContext`]s.
//!
//! The pool is an explicit object: build one at startup, wrap it in an `Arc`
//! and hand it to every call site that executes through a pipeline.
//!
//! ```
//! use resilient_exec_core::ContextPool;
//! use resilient_exec_core::CancellationToken;
//!
//! let pool = ContextPool::new();
//! let token = CancellationToken::new();
//!
//! let context = pool.acquire(token);
//! assert_eq!(context.attempt(), 0);
//! // ... execute through a pipeline ...
//! pool.release(context);
//! assert_eq!(pool.idle(), 1);
//! ```

use crate::context::ExecutionContext;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

/// Default number of idle contexts kept for reuse.
pub const DEFAULT_MAX_RETAINED: usize = 1024;

/// A lock-protected free list of execution contexts.
///
/// `acquire` and `release` may be called concurrently from any number of
/// tasks. Each context handed out is owned by its caller until it is
/// released, so a context is never shared between two executions.
#[derive(Debug)]
pub struct ContextPool {
    free: Mutex<Vec<ExecutionContext>>,
    max_retained: usize,
}

impl Default for ContextPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextPool {
    /// Creates a pool that retains up to [`DEFAULT_MAX_RETAINED`] idle contexts.
    pub fn new() -> Self {
        Self::with_max_retained(DEFAULT_MAX_RETAINED)
    }

    /// Creates a pool that retains at most `max_retained` idle contexts.
    ///
    /// Contexts released beyond that are dropped.
    pub fn with_max_retained(max_retained: usize) -> Self {
        Self {
            free: Mutex::new(Vec::new()),
            max_retained,
        }
    }

    fn free(&self) -> MutexGuard<'_, Vec<ExecutionContext>> {
        // Only whole contexts are pushed or popped, so the list stays valid after a panic.
        self.free.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes a context bound to `token`, with an empty property bag and attempt 0.
    pub fn acquire(&self, token: CancellationToken) -> ExecutionContext {
        self.acquire_inner(None, token)
    }

    /// Like [`acquire`](Self::acquire), also setting the operation key.
    pub fn acquire_with_key(
        &self,
        operation_key: impl Into<String>,
        token: CancellationToken,
    ) -> ExecutionContext {
        self.acquire_inner(Some(operation_key.into()), token)
    }

    fn acquire_inner(&self, operation_key: Option<String>, token: CancellationToken) -> ExecutionContext {
        let reused = self.free().pop();
        let mut context = reused.unwrap_or_default();
        context.bind(operation_key, token);
        tracing::trace!(operation_key = ?context.operation_key(), "execution context acquired");
        context
    }

    /// Clears `context` and makes it available for reuse.
    ///
    /// Properties are dropped and the cancellation binding is removed before
    /// the context reaches the free list.
    pub fn release(&self, mut context: ExecutionContext) {
        context.reset();
        let mut free = self.free();
        if free.len() < self.max_retained {
            free.push(context);
        }
    }

    /// Returns the number of idle contexts waiting for reuse.
    pub fn idle(&self) -> usize {
        self.free().len()
    }
}
