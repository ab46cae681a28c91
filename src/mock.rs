//! `MockTask` — a test double for [`Task`].
//!
//! Useful in unit and integration tests where a real task implementation is
//! either unavailable or irrelevant.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::task::{Results, Task};

/// Behaviour injected into `MockTask` at construction time.
pub enum MockBehaviour {
    /// Return a specific JSON value.
    ReturnValue(Value),
    /// Fail with the given message.
    Fail(String),
}

/// A mock task that records every call it receives and returns a
/// programmer-specified result.
pub struct MockTask {
    /// Label used in test assertions.
    pub name: String,
    /// What the task will do when `run` is called.
    pub behaviour: MockBehaviour,
    /// All dependency maps seen by this task (in call order).
    pub calls: Arc<Mutex<Vec<Results>>>,
}

impl MockTask {
    /// Create a mock that always succeeds with the given value.
    pub fn returning(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            behaviour: MockBehaviour::ReturnValue(value),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a mock that always fails with the given message.
    pub fn failing(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            behaviour: MockBehaviour::Fail(msg.into()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of times this task has been run.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Task for MockTask {
    async fn run(&self, deps: Results) -> anyhow::Result<Value> {
        self.calls.lock().unwrap().push(deps);

        match &self.behaviour {
            MockBehaviour::ReturnValue(value) => Ok(value.clone()),
            MockBehaviour::Fail(msg) => Err(anyhow::anyhow!(msg.clone())),
        }
    }
}
