//! The `Flow` builder — the registration surface of the engine.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tracing::{instrument, warn};

use crate::dag;
use crate::error::FlowError;
use crate::executor;
use crate::task::{FnTask, Results, Task, TaskRecord};

/// A dependency graph of named tasks, built by chained registration and run
/// once with [`Flow::run`].
///
/// Each instance owns all of its state; separate flows can be built and run
/// concurrently without interfering with each other.
pub struct Flow {
    tasks: HashMap<String, TaskRecord>,
}

impl Flow {
    /// Create an empty flow.
    pub fn new() -> Self {
        Self {
            tasks: HashMap::new(),
        }
    }

    /// Register a task backed by an async closure.
    ///
    /// `deps` lists the names of the tasks whose values the closure receives
    /// in its `Results` argument. Registering a name twice replaces the
    /// earlier task (last write wins); a `warn!` is emitted when that
    /// happens, since it is usually a mistake.
    pub fn add<F, Fut>(self, name: impl Into<String>, deps: &[&str], f: F) -> Self
    where
        F: Fn(Results) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.add_task(name, deps, Arc::new(FnTask::new(f)))
    }

    /// Register a task given a [`Task`] trait object.
    pub fn add_task(mut self, name: impl Into<String>, deps: &[&str], task: Arc<dyn Task>) -> Self {
        let name = name.into();
        let record = TaskRecord::new(deps.iter().map(|d| d.to_string()).collect(), task);

        if self.tasks.insert(name.clone(), record).is_some() {
            warn!(task = %name, "replacing previously registered task");
        }
        self
    }

    /// Validate the graph and run it to completion.
    ///
    /// Blocks until every task has either produced a value or the run was
    /// cancelled by the first failure.
    ///
    /// # Errors
    /// - [`FlowError::SelfDependency`], [`FlowError::UnknownDependency`], or
    ///   [`FlowError::CycleDetected`] if the graph is invalid; no task runs.
    /// - [`FlowError::TaskFailed`] with the first recorded failure and the
    ///   partial result mapping if a task's function returned an error.
    #[instrument(skip(self), fields(tasks = self.tasks.len()))]
    pub async fn run(self) -> Result<Results, FlowError> {
        let mut tasks = self.tasks;
        dag::validate(&mut tasks)?;
        executor::execute(tasks).await
    }
}

impl Default for Flow {
    fn default() -> Self {
        Self::new()
    }
}
