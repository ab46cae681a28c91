//! The `Task` trait — the contract every unit of work must fulfil.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

/// Task-name-keyed value map.
///
/// A task's function receives one of these holding an entry per declared
/// dependency; a completed run returns one holding an entry per registered
/// task. `Value::Null` stands in for a value a task never produced.
pub type Results = HashMap<String, Value>;

/// The core task trait.
///
/// Implement this directly for stateful tasks, or register a plain async
/// closure via [`Flow::add`](crate::Flow::add), which wraps it in an adapter
/// implementing this trait.
#[async_trait]
pub trait Task: Send + Sync {
    /// Execute the task. `deps` maps each declared dependency's name to the
    /// value its task produced. Callers own the map; it is not reused after
    /// this returns.
    async fn run(&self, deps: Results) -> anyhow::Result<Value>;
}

/// Adapter turning an async closure into a [`Task`].
pub(crate) struct FnTask<F> {
    f: F,
}

impl<F> FnTask<F> {
    pub(crate) fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> Task for FnTask<F>
where
    F: Fn(Results) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send,
{
    async fn run(&self, deps: Results) -> anyhow::Result<Value> {
        (self.f)(deps).await
    }
}

/// One registered task: its dependency list, its implementation, and how
/// many readers its result fans out to.
pub(crate) struct TaskRecord {
    /// Dependency names, in the order they were supplied.
    pub(crate) deps: Vec<String>,
    /// 1 (the collector's copy) + the number of tasks depending on this one.
    /// Incremented during validation, fixed for the rest of the run.
    pub(crate) fan_out: usize,
    pub(crate) task: Arc<dyn Task>,
}

impl TaskRecord {
    pub(crate) fn new(deps: Vec<String>, task: Arc<dyn Task>) -> Self {
        Self {
            deps,
            // The collector always consumes one copy of the result.
            fan_out: 1,
            task,
        }
    }
}
