//! Execution plans: task ownership, ordering, readiness, and status
//! aggregation.
//!
//! An `ExecutionPlan` owns a set of tasks and the dependency edges between
//! them. It computes a deterministic execution order over the
//! `FinishToStart` sub-graph, answers which tasks are ready to run, and
//! derives its own status from the statuses of its tasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

use crate::core::task::{DependencyType, Task, TaskDependency, TaskId, TaskStatus, TaskUpdate};
use crate::error::{Error, Result};

/// Unique identifier for an execution plan.
///
/// Like task ids these are opaque strings: generated plans get a UUID v4,
/// placeholder plans keep whatever id the external notification carried.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanId(pub String);

impl PlanId {
    /// Create a new unique plan identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Return a prefix of at most 8 bytes of the id for display.
    ///
    /// Ids are opaque and may contain multi-byte characters, so the cut
    /// backs up to the nearest char boundary instead of slicing blindly.
    pub fn short(&self) -> &str {
        let mut end = self.0.len().min(8);
        while !self.0.is_char_boundary(end) {
            end -= 1;
        }
        &self.0[..end]
    }
}

impl Default for PlanId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PlanId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PlanId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Overall status of an execution plan.
///
/// Always derived from the multiset of task statuses, never set directly
/// by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    /// No task has started yet.
    #[default]
    Pending,
    /// At least one task is running.
    InProgress,
    /// Every task completed successfully.
    Completed,
    /// At least one task failed.
    Failed,
    /// No task is running or failed, but at least one is blocked.
    Blocked,
}

impl PlanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanStatus::Pending => "pending",
            PlanStatus::InProgress => "in_progress",
            PlanStatus::Completed => "completed",
            PlanStatus::Failed => "failed",
            PlanStatus::Blocked => "blocked",
        }
    }

    /// Check if the plan has reached a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlanStatus::Completed | PlanStatus::Failed)
    }
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A plan for executing a set of tasks with dependencies.
///
/// Tasks are kept in insertion order and dependencies in authoring order,
/// so every iteration the plan performs is reproducible. The derived
/// `status` and the cached `execution_order` are only mutated through the
/// plan's own methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    /// Unique identifier for this plan.
    pub id: PlanId,
    /// The request text that produced this plan, kept for replanning.
    pub original_request: String,
    /// Tasks in insertion order.
    tasks: Vec<Task>,
    /// Dependency edges in authoring order.
    dependencies: Vec<TaskDependency>,
    /// Derived overall status.
    status: PlanStatus,
    /// Task ids in execution order; empty until first computed.
    execution_order: Vec<TaskId>,
    /// When the plan was created.
    pub created_at: DateTime<Utc>,
    /// When the first task started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the plan first reached Completed or Failed.
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExecutionPlan {
    /// Create a new empty plan for the given request text.
    pub fn new(original_request: &str) -> Self {
        Self {
            id: PlanId::new(),
            original_request: original_request.to_string(),
            tasks: Vec::new(),
            dependencies: Vec::new(),
            status: PlanStatus::Pending,
            execution_order: Vec::new(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Replace the generated id with an explicit one.
    pub fn with_id(mut self, id: PlanId) -> Self {
        self.id = id;
        self
    }

    /// Add a task to the plan.
    ///
    /// Task ids are unique within a plan; adding a task whose id is already
    /// present is ignored.
    pub fn add_task(&mut self, task: Task) {
        if self.contains_task(&task.id) {
            return;
        }
        self.tasks.push(task);
        self.recompute_status();
    }

    /// Add a dependency edge to the plan.
    ///
    /// References to tasks not present in the plan are accepted; such edges
    /// are skipped by ordering and vacuously satisfied by readiness.
    pub fn add_dependency(&mut self, dependency: TaskDependency) {
        self.dependencies.push(dependency);
    }

    /// Get a reference to a task by id.
    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    fn task_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| &t.id == id)
    }

    /// All tasks in insertion order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// All dependency edges in authoring order.
    pub fn dependencies(&self) -> &[TaskDependency] {
        &self.dependencies
    }

    /// The derived plan status.
    pub fn status(&self) -> PlanStatus {
        self.status
    }

    /// The cached execution order; empty until `compute_execution_order`
    /// has succeeded at least once.
    pub fn execution_order(&self) -> &[TaskId] {
        &self.execution_order
    }

    pub fn contains_task(&self, id: &TaskId) -> bool {
        self.tasks.iter().any(|t| &t.id == id)
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    pub fn dependency_count(&self) -> usize {
        self.dependencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Compute a valid execution order for the plan's tasks.
    ///
    /// Runs Kahn's algorithm over the sub-graph induced by `FinishToStart`
    /// edges only; other dependency types affect readiness, not ordering.
    /// Ties among simultaneously-ready tasks break FIFO by discovery order,
    /// seeded from task insertion order. Edges referencing tasks outside
    /// the plan are skipped.
    ///
    /// # Errors
    ///
    /// Returns `Error::CycleDetected` if the `FinishToStart` edges contain
    /// a cycle. The previously cached order (if any) is left untouched.
    pub fn compute_execution_order(&mut self) -> Result<Vec<TaskId>> {
        let position: HashMap<&TaskId, usize> = self
            .tasks
            .iter()
            .enumerate()
            .map(|(i, t)| (&t.id, i))
            .collect();

        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); self.tasks.len()];
        let mut in_degree: Vec<usize> = vec![0; self.tasks.len()];

        for dep in &self.dependencies {
            if dep.dependency_type != DependencyType::FinishToStart {
                continue;
            }
            let (Some(&source), Some(&target)) = (
                position.get(&dep.source_task_id),
                position.get(&dep.target_task_id),
            ) else {
                continue;
            };
            adjacency[source].push(target);
            in_degree[target] += 1;
        }

        let mut queue: VecDeque<usize> = (0..self.tasks.len())
            .filter(|&i| in_degree[i] == 0)
            .collect();

        let mut order: Vec<TaskId> = Vec::with_capacity(self.tasks.len());
        while let Some(current) = queue.pop_front() {
            order.push(self.tasks[current].id.clone());
            for &neighbor in &adjacency[current] {
                in_degree[neighbor] -= 1;
                if in_degree[neighbor] == 0 {
                    queue.push_back(neighbor);
                }
            }
        }

        if order.len() != self.tasks.len() {
            return Err(Error::CycleDetected(self.id.clone()));
        }

        self.execution_order = order.clone();
        Ok(order)
    }

    /// Get the tasks that are ready to be executed.
    ///
    /// A task is ready iff it is `Pending` and every dependency edge
    /// targeting it is satisfied: a `FinishToStart` source must be
    /// `Completed`, a `StartToStart` source must have at least started.
    /// `FinishToFinish`/`StartToFinish` edges never gate readiness, and
    /// edges whose source is absent from the plan are vacuously satisfied.
    pub fn ready_tasks(&self) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Pending && self.dependencies_met(&t.id))
            .collect()
    }

    fn dependencies_met(&self, id: &TaskId) -> bool {
        for dep in &self.dependencies {
            if &dep.target_task_id != id {
                continue;
            }
            let Some(source) = self.task(&dep.source_task_id) else {
                continue;
            };
            match dep.dependency_type {
                DependencyType::FinishToStart => {
                    if source.status != TaskStatus::Completed {
                        return false;
                    }
                }
                DependencyType::StartToStart => {
                    if source.status == TaskStatus::Pending {
                        return false;
                    }
                }
                // Reserved types: not enforced.
                DependencyType::FinishToFinish | DependencyType::StartToFinish => {}
            }
        }
        true
    }

    /// Apply an external update to a task and re-derive the plan status.
    ///
    /// # Errors
    ///
    /// Returns `Error::TaskNotFound` if the task is not part of the plan.
    pub fn update_task_status(&mut self, id: &TaskId, update: &TaskUpdate) -> Result<()> {
        let plan_id = self.id.clone();
        let task = self.task_mut(id).ok_or_else(|| Error::TaskNotFound {
            plan_id,
            task_id: id.clone(),
        })?;
        task.apply_update(update);
        self.recompute_status();
        Ok(())
    }

    /// Re-derive the plan status from the current task statuses.
    ///
    /// Priority: any failure dominates, then full completion, then any task
    /// in progress, then any blocked task, otherwise pending. An empty plan
    /// is pending. Plan timestamps are set the first time the matching
    /// status is reached.
    fn recompute_status(&mut self) {
        let next = if self.tasks.is_empty() {
            PlanStatus::Pending
        } else if self.tasks.iter().any(|t| t.status == TaskStatus::Failed) {
            PlanStatus::Failed
        } else if self.tasks.iter().all(|t| t.status == TaskStatus::Completed) {
            PlanStatus::Completed
        } else if self.tasks.iter().any(|t| t.status == TaskStatus::InProgress) {
            PlanStatus::InProgress
        } else if self.tasks.iter().any(|t| t.status == TaskStatus::Blocked) {
            PlanStatus::Blocked
        } else {
            PlanStatus::Pending
        };

        self.status = next;
        match next {
            PlanStatus::Completed | PlanStatus::Failed => {
                if self.completed_at.is_none() {
                    self.completed_at = Some(Utc::now());
                }
            }
            PlanStatus::InProgress => {
                if self.started_at.is_none() {
                    self.started_at = Some(Utc::now());
                }
            }
            PlanStatus::Pending | PlanStatus::Blocked => {}
        }
    }
}
