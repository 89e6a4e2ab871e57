//! Stateless planning algorithms.
//!
//! Free functions that link decomposed tasks with dependencies, score
//! executor candidates against a task's required capabilities, and
//! assemble a finished plan from a request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::core::plan::ExecutionPlan;
use crate::core::task::{Task, TaskDependency};
use crate::error::Result;
use crate::planning::decompose::Decomposer;
use crate::tlog_trace;

/// Availability of an executor candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    #[default]
    Idle,
    Busy,
}

/// An executor candidate offered to `select_executor`.
///
/// Candidates are passed as a slice so that iteration order, and therefore
/// tie-breaking, is controlled by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorProfile {
    /// Unique identifier of the executor.
    pub id: String,
    /// Capability tags this executor offers.
    pub capabilities: Vec<String>,
    /// Whether the executor can take on work right now.
    pub availability: Availability,
    /// When the executor last ran a task; `None` means never used.
    pub last_used: Option<DateTime<Utc>>,
}

impl ExecutorProfile {
    /// Create an idle, never-used profile with the given capabilities.
    pub fn new(id: impl Into<String>, capabilities: Vec<String>) -> Self {
        Self {
            id: id.into(),
            capabilities,
            availability: Availability::Idle,
            last_used: None,
        }
    }

    pub fn busy(mut self) -> Self {
        self.availability = Availability::Busy;
        self
    }

    pub fn with_last_used(mut self, at: DateTime<Utc>) -> Self {
        self.last_used = Some(at);
        self
    }
}

/// Link an ordered task sequence into a linear chain.
///
/// Produces n-1 `FinishToStart` edges, each linking task i-1 to task i.
/// This is the default linking strategy for a freshly decomposed list and
/// encodes "run subtasks strictly in the order they were produced".
pub fn build_linear_dependencies(tasks: &[Task]) -> Vec<TaskDependency> {
    tasks
        .windows(2)
        .map(|pair| TaskDependency::new(pair[0].id.clone(), pair[1].id.clone()))
        .collect()
}

/// Select the best executor for a task by capability overlap.
///
/// Non-idle candidates are skipped outright, as are candidates sharing no
/// required capability when the task does require capabilities. A task
/// with no required capabilities scores every idle candidate at 1.0;
/// otherwise the score is the fraction of required capabilities the
/// candidate offers. Never-used candidates get a flat +0.1 bonus to
/// spread load. The first candidate reaching the maximum score wins.
///
/// Returns `None` when no candidate qualifies.
pub fn select_executor(task: &Task, candidates: &[ExecutorProfile]) -> Option<String> {
    let mut best_id: Option<&str> = None;
    let mut best_score = f64::NEG_INFINITY;

    for candidate in candidates {
        if candidate.availability != Availability::Idle {
            continue;
        }

        let match_score = if task.required_capabilities.is_empty() {
            1.0
        } else {
            let hits = task
                .required_capabilities
                .iter()
                .filter(|c| candidate.capabilities.contains(c))
                .count();
            hits as f64 / task.required_capabilities.len() as f64
        };

        // A candidate sharing nothing with a capability-requiring task is
        // not eligible; the never-used bonus must not rescue it.
        if match_score <= 0.0 && !task.required_capabilities.is_empty() {
            continue;
        }

        let recency_bonus = if candidate.last_used.is_none() { 0.1 } else { 0.0 };
        let score = match_score + recency_bonus;
        tlog_trace!(
            "Executor {} scored {:.3} for task {}",
            candidate.id,
            score,
            task.id.short()
        );

        if score > best_score {
            best_score = score;
            best_id = Some(&candidate.id);
        }
    }

    if best_score > 0.0 {
        best_id.map(|id| id.to_string())
    } else {
        None
    }
}

/// Create a complete execution plan for a request.
///
/// Combines decomposition, linear dependency linking, and execution-order
/// computation into a single operation. Any failure aborts with no
/// partial plan.
pub fn compose_plan(
    description: &str,
    context: &HashMap<String, Value>,
    decomposer: &dyn Decomposer,
) -> Result<ExecutionPlan> {
    let subtasks = decomposer.decompose(description, context)?;

    let mut plan = ExecutionPlan::new(description);
    let dependencies = build_linear_dependencies(&subtasks);
    for task in subtasks {
        plan.add_task(task);
    }
    for dependency in dependencies {
        plan.add_dependency(dependency);
    }
    plan.compute_execution_order()?;

    Ok(plan)
}
