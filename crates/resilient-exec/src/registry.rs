//! Named pipelines shared across an application.

use crate::pipeline::ResiliencePipeline;
use resilient_exec_core::ConfigError;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A map of pipelines keyed by `K`.
///
/// Pipelines are configured once, registered under a key at startup or on
/// first use, and then looked up by every call site that needs them.
///
/// ```
/// use resilient_exec::{PipelineRegistry, ResiliencePipeline};
///
/// let registry = PipelineRegistry::<&'static str, u16, String>::new();
/// registry.add("test-pipeline", ResiliencePipeline::builder().name("test-pipeline").build());
///
/// let pipeline = registry.get(&"test-pipeline").unwrap();
/// assert_eq!(pipeline.name(), "test-pipeline");
/// ```
pub struct PipelineRegistry<K, T, E> {
    pipelines: RwLock<HashMap<K, ResiliencePipeline<T, E>>>,
}

impl<K, T, E> Default for PipelineRegistry<K, T, E>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T, E> PipelineRegistry<K, T, E>
where
    K: Eq + Hash,
{
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            pipelines: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<K, ResiliencePipeline<T, E>>> {
        self.pipelines.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<K, ResiliencePipeline<T, E>>> {
        self.pipelines.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `pipeline` under `key`, returning the pipeline it replaced.
    pub fn add(&self, key: K, pipeline: ResiliencePipeline<T, E>) -> Option<ResiliencePipeline<T, E>> {
        self.write().insert(key, pipeline)
    }

    /// Returns the pipeline registered under `key`.
    pub fn get(&self, key: &K) -> Option<ResiliencePipeline<T, E>> {
        self.read().get(key).cloned()
    }

    /// Returns the pipeline under `key`, building and registering it on first use.
    ///
    /// `build` runs at most once per key, under the registry's write lock.
    pub fn get_or_add<F>(&self, key: K, build: F) -> ResiliencePipeline<T, E>
    where
        F: FnOnce(&K) -> ResiliencePipeline<T, E>,
    {
        if let Some(pipeline) = self.get(&key) {
            return pipeline;
        }
        let mut pipelines = self.write();
        if let Some(pipeline) = pipelines.get(&key) {
            return pipeline.clone();
        }
        let pipeline = build(&key);
        pipelines.insert(key, pipeline.clone());
        pipeline
    }

    /// Like [`get_or_add`](Self::get_or_add) for builders that validate options.
    ///
    /// Nothing is registered when `build` fails.
    pub fn get_or_try_add<F>(&self, key: K, build: F) -> Result<ResiliencePipeline<T, E>, ConfigError>
    where
        F: FnOnce(&K) -> Result<ResiliencePipeline<T, E>, ConfigError>,
    {
        if let Some(pipeline) = self.get(&key) {
            return Ok(pipeline);
        }
        let mut pipelines = self.write();
        if let Some(pipeline) = pipelines.get(&key) {
            return Ok(pipeline.clone());
        }
        let pipeline = build(&key)?;
        pipelines.insert(key, pipeline.clone());
        Ok(pipeline)
    }

    /// Removes and returns the pipeline under `key`.
    pub fn remove(&self, key: &K) -> Option<ResiliencePipeline<T, E>> {
        self.write().remove(key)
    }

    /// Returns `true` if a pipeline is registered under `key`.
    pub fn contains(&self, key: &K) -> bool {
        self.read().contains_key(key)
    }

    /// Returns the number of registered pipelines.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl<K, T, E> fmt::Debug for PipelineRegistry<K, T, E>
where
    K: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pipelines = self.pipelines.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_set().entries(pipelines.keys()).finish()
    }
}
