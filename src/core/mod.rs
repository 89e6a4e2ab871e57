//! Core domain models for trellis planning.
//!
//! This module contains the fundamental data structures of the planning
//! system: tasks, dependency edges, and the execution plan that owns them.

pub mod plan;
pub mod task;

pub use plan::{ExecutionPlan, PlanId, PlanStatus};
pub use task::{DependencyType, Task, TaskDependency, TaskId, TaskStatus, TaskUpdate};
