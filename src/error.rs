use thiserror::Error;

use crate::core::plan::PlanId;
use crate::core::task::TaskId;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Dependency cycle detected in plan {0}")]
    CycleDetected(PlanId),

    #[error("Plan not found: {0}")]
    PlanNotFound(PlanId),

    #[error("Task {task_id} not found in plan {plan_id}")]
    TaskNotFound { plan_id: PlanId, task_id: TaskId },

    #[error("Invalid task status: {0}")]
    InvalidStatus(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Decomposition failed: {0}")]
    Decomposition(String),
}

pub type Result<T> = std::result::Result<T, Error>;
