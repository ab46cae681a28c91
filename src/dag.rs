//! Graph validation — runs once, before any task is spawned.
//!
//! Rules enforced:
//! 1. No task may depend on itself.
//! 2. Every dependency must name a registered task.
//! 3. The dependency graph must be acyclic (Kahn's algorithm).
//!
//! As a side effect, computes every task's fan-out count: 1 for the
//! collector plus one for each task that lists it as a dependency. The
//! execution engine sizes each task's broadcast channel from this count.

use std::collections::{HashMap, VecDeque};

use tracing::debug;

use crate::error::FlowError;
use crate::task::TaskRecord;

/// Validate the graph and bake fan-out counts into the records.
///
/// # Errors
/// - [`FlowError::SelfDependency`] if a task depends on itself.
/// - [`FlowError::UnknownDependency`] if a dependency was never registered.
/// - [`FlowError::CycleDetected`] if the graph is not acyclic.
pub(crate) fn validate(tasks: &mut HashMap<String, TaskRecord>) -> Result<(), FlowError> {
    // -----------------------------------------------------------------------
    // 1. Check every edge; tally fan-out increments as we go.
    // -----------------------------------------------------------------------
    let mut fan_out_bumps: HashMap<String, usize> = HashMap::new();

    for (name, record) in tasks.iter() {
        for dep in &record.deps {
            if dep == name {
                return Err(FlowError::SelfDependency(name.clone()));
            }
            if !tasks.contains_key(dep.as_str()) {
                return Err(FlowError::UnknownDependency(dep.clone()));
            }
            *fan_out_bumps.entry(dep.clone()).or_insert(0) += 1;
        }
    }

    // -----------------------------------------------------------------------
    // 2. Topological pass (Kahn's algorithm) to reject cycles.
    // -----------------------------------------------------------------------
    let mut in_degree: HashMap<&str, usize> = tasks
        .iter()
        .map(|(name, record)| (name.as_str(), record.deps.len()))
        .collect();

    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for (name, record) in tasks.iter() {
        for dep in &record.deps {
            dependents.entry(dep.as_str()).or_default().push(name.as_str());
        }
    }

    // Seed with tasks that have no dependencies.
    let mut queue: VecDeque<&str> = in_degree
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&name, _)| name)
        .collect();

    let mut visited = 0usize;
    while let Some(name) = queue.pop_front() {
        visited += 1;

        if let Some(children) = dependents.get(name) {
            for &child in children {
                if let Some(deg) = in_degree.get_mut(child) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(child);
                    }
                }
            }
        }
    }

    // If we didn't visit every task the graph contains a cycle.
    if visited != tasks.len() {
        return Err(FlowError::CycleDetected);
    }

    // -----------------------------------------------------------------------
    // 3. Apply the fan-out increments. Counts are fixed from here on.
    // -----------------------------------------------------------------------
    for (name, bump) in fan_out_bumps {
        if let Some(record) = tasks.get_mut(&name) {
            record.fan_out += bump;
        }
    }

    debug!(tasks = tasks.len(), "graph validated");
    Ok(())
}
