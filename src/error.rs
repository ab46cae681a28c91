//! Engine-level error types.

use thiserror::Error;

use crate::task::Results;

/// Errors produced by the flow engine (validation + execution).
#[derive(Debug, Error)]
pub enum FlowError {
    // ------ Validation errors ------

    /// A task lists itself as a dependency.
    #[error("task '{0}' depends on itself")]
    SelfDependency(String),

    /// A task lists a dependency name that was never registered.
    #[error("unknown dependency '{0}'")]
    UnknownDependency(String),

    /// The dependency graph contains a cycle; running it would never finish.
    #[error("task graph contains a cycle")]
    CycleDetected,

    // ------ Execution errors ------

    /// A task's function returned an error during the run. The first failure
    /// wins; all other tasks are cancelled.
    #[error("task '{task}' failed: {error}")]
    TaskFailed {
        /// Name of the failing task.
        task: String,
        /// The error its function returned.
        error: anyhow::Error,
        /// Values produced and delivered before the run was cancelled.
        /// Tasks that never produced a value hold `Value::Null`.
        partial: Results,
    },
}

impl FlowError {
    /// The result mapping assembled before the run was cancelled, if this is
    /// an execution error. Callers must not assume it is complete.
    pub fn partial_results(&self) -> Option<&Results> {
        match self {
            FlowError::TaskFailed { partial, .. } => Some(partial),
            _ => None,
        }
    }
}
