//! Planning layer: request decomposition, ordering and selection
//! algorithms, and the coordinator that owns live plans.

pub mod algorithms;
pub mod coordinator;
pub mod decompose;

pub use algorithms::{build_linear_dependencies, compose_plan, select_executor};
pub use algorithms::{Availability, ExecutorProfile};
pub use coordinator::{PlanCoordinator, RecoveryPolicy};
pub use decompose::{Decomposer, KeywordDecomposer};
