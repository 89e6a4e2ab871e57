//! Task data model for execution plans.
//!
//! Tasks are the atomic units of work handed to external executors. Each
//! task tracks its required capabilities, status, assignment, and result
//! payload. Dependencies between tasks are expressed as typed edges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

use crate::error::Error;

/// Unique identifier for a task within a plan.
///
/// Ids are opaque strings: freshly created tasks get a UUID v4, but ids
/// arriving in external notifications may be arbitrary (e.g. a placeholder
/// synthesized for an unknown reference keeps the caller's id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub String);

impl TaskId {
    /// Create a new unique task identifier.
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

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TaskId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Task status in its lifecycle.
///
/// Tasks progress `Pending -> InProgress -> {Completed, Failed}`; `Blocked`
/// is assigned externally from `Pending` and returns to `Pending` when
/// unblocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Task created but not yet started.
    #[default]
    Pending,
    /// Task is currently being executed.
    InProgress,
    /// Task completed successfully.
    Completed,
    /// Task failed with an error.
    Failed,
    /// Task is blocked and cannot proceed until unblocked.
    Blocked,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Blocked => "blocked",
        }
    }

    /// Check if the status is terminal (Completed or Failed).
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            "blocked" => Ok(TaskStatus::Blocked),
            other => Err(Error::InvalidStatus(other.to_string())),
        }
    }
}

/// Type of dependency between two tasks.
///
/// Only `FinishToStart` participates in topological ordering, and only
/// `FinishToStart`/`StartToStart` gate readiness. The remaining two variants
/// are accepted and stored but not enforced anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    /// Target may start only after the source finishes.
    #[default]
    FinishToStart,
    /// Target may start only after the source starts.
    StartToStart,
    /// Reserved: target may finish only after the source finishes.
    FinishToFinish,
    /// Reserved: target may finish only after the source starts.
    StartToFinish,
}

impl DependencyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyType::FinishToStart => "finish_to_start",
            DependencyType::StartToStart => "start_to_start",
            DependencyType::FinishToFinish => "finish_to_finish",
            DependencyType::StartToFinish => "start_to_finish",
        }
    }
}

impl std::fmt::Display for DependencyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A typed ordering constraint between two tasks in the same plan.
///
/// Edges are plain records owned by the plan; a dependency whose source or
/// target id is not present in the plan is inert rather than an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDependency {
    /// The task being depended on.
    pub source_task_id: TaskId,
    /// The task that depends on the source.
    pub target_task_id: TaskId,
    /// The kind of constraint the edge expresses.
    #[serde(default)]
    pub dependency_type: DependencyType,
}

impl TaskDependency {
    /// Create a `FinishToStart` dependency from `source` to `target`.
    pub fn new(source: TaskId, target: TaskId) -> Self {
        Self {
            source_task_id: source,
            target_task_id: target,
            dependency_type: DependencyType::FinishToStart,
        }
    }

    /// Create a dependency with an explicit type.
    pub fn with_type(source: TaskId, target: TaskId, dependency_type: DependencyType) -> Self {
        Self {
            source_task_id: source,
            target_task_id: target,
            dependency_type,
        }
    }
}

/// An external status notification for a task.
///
/// Carries the new status plus the optional payloads set on the matching
/// transition: a result value on completion, an error message on failure,
/// and the executor id when work starts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskUpdate {
    pub status: TaskStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub executor: Option<String>,
}

impl TaskUpdate {
    /// An update carrying only a status change.
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    /// An `InProgress` update naming the executor that picked up the task.
    pub fn started(executor: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::InProgress,
            executor: Some(executor.into()),
            ..Self::default()
        }
    }

    /// A `Completed` update with a result payload.
    pub fn completed(result: Value) -> Self {
        Self {
            status: TaskStatus::Completed,
            result: Some(result),
            ..Self::default()
        }
    }

    /// A `Failed` update with an error message.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Failed,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// A single task in an execution plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier for this task.
    pub id: TaskId,
    /// Human-readable description of the work.
    pub description: String,
    /// Capability tags an executor must offer to run this task.
    #[serde(default)]
    pub required_capabilities: Vec<String>,
    /// Estimated complexity relative to an average task (1.0). Informational.
    pub estimated_complexity: f64,
    /// Opaque key/value context owned by the task.
    #[serde(default)]
    pub context: HashMap<String, Value>,
    /// Current execution status.
    pub status: TaskStatus,
    /// Id of the executor assigned on the transition to InProgress.
    pub assigned_executor: Option<String>,
    /// Result payload set on completion.
    pub result: Option<Value>,
    /// Error message set on failure.
    pub error: Option<String>,
    /// When the task was created.
    pub created_at: DateTime<Utc>,
    /// When the task started execution.
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a new pending task with the given description.
    pub fn new(description: &str) -> Self {
        Self {
            id: TaskId::new(),
            description: description.to_string(),
            required_capabilities: Vec::new(),
            estimated_complexity: 1.0,
            context: HashMap::new(),
            status: TaskStatus::Pending,
            assigned_executor: None,
            result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Replace the generated id with an explicit one.
    pub fn with_id(mut self, id: TaskId) -> Self {
        self.id = id;
        self
    }

    pub fn with_capabilities(mut self, capabilities: Vec<String>) -> Self {
        self.required_capabilities = capabilities;
        self
    }

    pub fn with_complexity(mut self, complexity: f64) -> Self {
        self.estimated_complexity = complexity;
        self
    }

    pub fn with_context(mut self, context: HashMap<String, Value>) -> Self {
        self.context = context;
        self
    }

    /// Merge caller-supplied context into this task's own context.
    ///
    /// Existing keys are overwritten; the task keeps exclusive ownership
    /// of the merged map.
    pub fn merge_context(&mut self, context: &HashMap<String, Value>) {
        for (key, value) in context {
            self.context.insert(key.clone(), value.clone());
        }
    }

    /// Start the task: `Pending|Blocked -> InProgress`.
    ///
    /// Records the executor and the start time. The start time is only set
    /// on the first transition.
    pub fn start(&mut self, executor: &str) {
        self.status = TaskStatus::InProgress;
        self.assigned_executor = Some(executor.to_string());
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
    }

    /// Complete the task with a result payload.
    pub fn complete(&mut self, result: Option<Value>) {
        self.status = TaskStatus::Completed;
        self.result = result;
        self.completed_at = Some(Utc::now());
    }

    /// Fail the task with an error message.
    pub fn fail(&mut self, error: &str) {
        self.status = TaskStatus::Failed;
        self.error = Some(error.to_string());
        self.completed_at = Some(Utc::now());
    }

    /// Mark the task as blocked.
    pub fn block(&mut self) {
        self.status = TaskStatus::Blocked;
    }

    /// Return a blocked task to pending.
    pub fn unblock(&mut self) {
        if self.status == TaskStatus::Blocked {
            self.status = TaskStatus::Pending;
        }
    }

    /// Apply an external status update.
    ///
    /// Overwrites the status and the payload matching the transition.
    /// Re-sending a terminal status refreshes the payload and the
    /// `completed_at` timestamp, deliberately absorbing duplicate
    /// notifications from at-least-once delivery.
    pub fn apply_update(&mut self, update: &TaskUpdate) {
        self.status = update.status;
        match update.status {
            TaskStatus::InProgress => {
                if let Some(executor) = &update.executor {
                    self.assigned_executor = Some(executor.clone());
                }
                if self.started_at.is_none() {
                    self.started_at = Some(Utc::now());
                }
            }
            TaskStatus::Completed => {
                self.result = update.result.clone();
                self.completed_at = Some(Utc::now());
            }
            TaskStatus::Failed => {
                self.error = update.error.clone();
                self.completed_at = Some(Utc::now());
            }
            TaskStatus::Pending | TaskStatus::Blocked => {}
        }
    }

    /// Check if the task is in a terminal state.
    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }
}
