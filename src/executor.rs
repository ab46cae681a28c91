//! The concurrent execution engine.
//!
//! One tokio task is spawned per registered task. Each worker blocks on a
//! broadcast receiver per declared dependency, runs the user function once
//! all values have arrived, and fans its own value out through a broadcast
//! channel sized during validation. The first function error is recorded in
//! a shared slot and every channel is closed, which unblocks any worker
//! still waiting on a dependency so the whole run winds down instead of
//! deadlocking. The collector drains one copy of every task's terminal
//! state into the result mapping.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

use crate::error::FlowError;
use crate::task::{Results, Task, TaskRecord};

// ---------------------------------------------------------------------------
// Shared run state
// ---------------------------------------------------------------------------

/// State shared by every worker of one run.
///
/// Each sender lives behind a `Mutex<Option<..>>`: taking it out is the
/// idempotent "close" transition, and holding the lock across a send makes
/// send-vs-close race-free. The first-error slot is written at most once.
struct RunState {
    channels: HashMap<String, Mutex<Option<broadcast::Sender<Value>>>>,
    first_error: Mutex<Option<(String, anyhow::Error)>>,
}

impl RunState {
    fn new(senders: HashMap<String, broadcast::Sender<Value>>) -> Self {
        Self {
            channels: senders
                .into_iter()
                .map(|(name, tx)| (name, Mutex::new(Some(tx))))
                .collect(),
            first_error: Mutex::new(None),
        }
    }

    /// Record `err` as the run's error unless one was recorded already.
    fn record_error(&self, task: &str, err: anyhow::Error) {
        let mut slot = self.first_error.lock();
        if slot.is_none() {
            error!(task, error = %err, "task failed; cancelling run");
            *slot = Some((task.to_owned(), err));
        } else {
            debug!(task, error = %err, "discarding error; run already cancelled");
        }
    }

    fn error_pending(&self) -> bool {
        self.first_error.lock().is_some()
    }

    fn take_error(&self) -> Option<(String, anyhow::Error)> {
        self.first_error.lock().take()
    }

    /// Deliver `value` to everyone subscribed to `task`'s channel. A no-op
    /// if the channel was already closed by a cancelling worker.
    fn publish(&self, task: &str, value: Value) {
        if let Some(slot) = self.channels.get(task) {
            let guard = slot.lock();
            if let Some(tx) = guard.as_ref() {
                // Send fails only when no receiver is left, which is fine.
                let _ = tx.send(value);
            }
        }
    }

    /// Close `task`'s channel. Idempotent.
    fn close(&self, task: &str) {
        if let Some(slot) = self.channels.get(task) {
            slot.lock().take();
        }
    }

    /// Close every channel, unblocking all pending dependency reads.
    fn close_all(&self) {
        for slot in self.channels.values() {
            slot.lock().take();
        }
    }
}

/// Closes the owning worker's channel when dropped, so every exit path —
/// including a panicking task function — releases the channel exactly once.
struct CloseOnExit {
    state: Arc<RunState>,
    task: String,
}

impl Drop for CloseOnExit {
    fn drop(&mut self) {
        self.state.close(&self.task);
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Run a validated graph to completion.
///
/// Fan-out counts must already be baked into the records (see
/// [`crate::dag::validate`]).
pub(crate) async fn execute(tasks: HashMap<String, TaskRecord>) -> Result<Results, FlowError> {
    info!(tasks = tasks.len(), "executing task graph");

    // ------------------------------------------------------------------
    // Allocate one broadcast channel per task, sized to its fan-out, and
    // subscribe every reader before any worker starts. Subscribing first
    // guarantees no reader can miss a value.
    // ------------------------------------------------------------------
    let mut senders: HashMap<String, broadcast::Sender<Value>> =
        HashMap::with_capacity(tasks.len());
    for (name, record) in &tasks {
        let (tx, _) = broadcast::channel(record.fan_out);
        senders.insert(name.clone(), tx);
    }

    let mut dep_receivers: HashMap<String, Vec<(String, broadcast::Receiver<Value>)>> =
        HashMap::with_capacity(tasks.len());
    for (name, record) in &tasks {
        let receivers = record
            .deps
            .iter()
            .map(|dep| (dep.clone(), senders[dep.as_str()].subscribe()))
            .collect();
        dep_receivers.insert(name.clone(), receivers);
    }

    let collector_receivers: Vec<(String, broadcast::Receiver<Value>)> = tasks
        .keys()
        .map(|name| (name.clone(), senders[name.as_str()].subscribe()))
        .collect();

    let state = Arc::new(RunState::new(senders));

    // ------------------------------------------------------------------
    // Launch one worker per task. Handles are dropped: the collector's
    // per-task read below is what the run waits on, and a worker whose
    // function is still mid-flight after cancellation finishes on its own.
    // ------------------------------------------------------------------
    for (name, record) in tasks {
        let receivers = dep_receivers.remove(&name).unwrap_or_default();
        tokio::spawn(worker(name, receivers, record.task, Arc::clone(&state)));
    }

    // ------------------------------------------------------------------
    // Collect one copy of every task's terminal state. A closed channel
    // means the task never produced a value; its slot stays `Null`.
    // ------------------------------------------------------------------
    let mut results = Results::with_capacity(collector_receivers.len());
    for (name, mut rx) in collector_receivers {
        let value = match rx.recv().await {
            Ok(value) => value,
            Err(_) => Value::Null,
        };
        results.insert(name, value);
    }

    match state.take_error() {
        None => Ok(results),
        Some((task, err)) => Err(FlowError::TaskFailed {
            task,
            error: err,
            partial: results,
        }),
    }
}

async fn worker(
    name: String,
    deps: Vec<(String, broadcast::Receiver<Value>)>,
    task: Arc<dyn Task>,
    state: Arc<RunState>,
) {
    let _guard = CloseOnExit {
        state: Arc::clone(&state),
        task: name.clone(),
    };

    // Wait for every dependency. Each channel carries at most one value, so
    // a receive error means the channel was closed for cancellation: bail
    // out without invoking the function.
    let mut inputs = Results::with_capacity(deps.len());
    for (dep, mut rx) in deps {
        match rx.recv().await {
            Ok(value) => {
                inputs.insert(dep, value);
            }
            Err(_) => {
                debug!(task = %name, dep = %dep, "dependency cancelled; skipping task");
                return;
            }
        }
    }

    match task.run(inputs).await {
        Ok(value) => {
            // A concurrent failure may have been recorded while we ran;
            // deliver nothing in that case.
            if state.error_pending() {
                debug!(task = %name, "run cancelled; dropping result");
                return;
            }
            state.publish(&name, value);
            debug!(task = %name, "task completed");
        }
        Err(err) => {
            state.record_error(&name, err);
            state.close_all();
        }
    }
}
