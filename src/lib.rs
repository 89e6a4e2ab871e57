pub mod config;
pub mod core;
pub mod error;
pub mod log;
pub mod planning;

pub use config::Config;
pub use core::plan::{ExecutionPlan, PlanId, PlanStatus};
pub use core::task::{
    DependencyType, Task, TaskDependency, TaskId, TaskStatus, TaskUpdate,
};
pub use error::{Error, Result};
pub use planning::{
    build_linear_dependencies, compose_plan, select_executor, Availability, Decomposer,
    ExecutorProfile, KeywordDecomposer, PlanCoordinator, RecoveryPolicy,
};
