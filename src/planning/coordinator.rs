//! Plan coordinator: owns active and archived plans and applies external
//! task updates.
//!
//! The coordinator is the single authority over plan state. Executors
//! report per-task progress through `apply_task_update`; the coordinator
//! locates the right task in the right plan, mutates it, and re-derives
//! the plan status. A single `RwLock` over the plan maps guards every
//! read-modify-write sequence, so concurrent notifications cannot corrupt
//! the derived status.

use serde_json::json;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::core::plan::{ExecutionPlan, PlanId};
use crate::core::task::{Task, TaskId, TaskUpdate};
use crate::error::{Error, Result};
use crate::planning::algorithms::compose_plan;
use crate::planning::decompose::{Decomposer, KeywordDecomposer};
use crate::{tlog, tlog_warn};

/// How the coordinator treats updates referencing unknown plans or tasks.
///
/// `Lenient` favors availability: stale or out-of-order notifications are
/// absorbed by synthesizing placeholders and logging a warning. `Strict`
/// favors correctness: unknown references are rejected with typed errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecoveryPolicy {
    #[default]
    Lenient,
    Strict,
}

struct PlanStore {
    active: HashMap<PlanId, ExecutionPlan>,
    archived: HashMap<PlanId, ExecutionPlan>,
}

/// Coordinates plan creation, updates, archival, and replanning.
pub struct PlanCoordinator {
    store: RwLock<PlanStore>,
    decomposer: Arc<dyn Decomposer>,
    max_history_size: usize,
    policy: RecoveryPolicy,
}

impl PlanCoordinator {
    /// Create a coordinator with the default keyword decomposer, lenient
    /// recovery, and the given archived-plan capacity.
    pub fn new(max_history_size: usize) -> Self {
        Self {
            store: RwLock::new(PlanStore {
                active: HashMap::new(),
                archived: HashMap::new(),
            }),
            decomposer: Arc::new(KeywordDecomposer),
            max_history_size,
            policy: RecoveryPolicy::Lenient,
        }
    }

    /// Create a coordinator from a loaded config.
    pub fn from_config(config: &Config) -> Self {
        let policy = if config.strict {
            RecoveryPolicy::Strict
        } else {
            RecoveryPolicy::Lenient
        };
        Self::new(config.max_history_size).with_policy(policy)
    }

    /// Replace the decomposition strategy.
    pub fn with_decomposer(mut self, decomposer: Arc<dyn Decomposer>) -> Self {
        self.decomposer = decomposer;
        self
    }

    /// Replace the recovery policy.
    pub fn with_policy(mut self, policy: RecoveryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> RecoveryPolicy {
        self.policy
    }

    /// Create a plan for a request and store it as active.
    ///
    /// Runs the decomposition strategy, links the subtasks linearly,
    /// computes the execution order, and stores the result. Decomposition
    /// and ordering failures propagate; no partial plan is stored.
    pub async fn create_plan(
        &self,
        description: &str,
        context: &HashMap<String, Value>,
    ) -> Result<ExecutionPlan> {
        let plan = compose_plan(description, context, self.decomposer.as_ref())?;
        tlog!(
            "Created plan {} with {} tasks",
            plan.id.short(),
            plan.task_count()
        );

        let mut store = self.store.write().await;
        store.active.insert(plan.id.clone(), plan.clone());
        Ok(plan)
    }

    /// Get a plan by id, looking in active then archived stores.
    pub async fn get_plan(&self, id: &PlanId) -> Result<ExecutionPlan> {
        let store = self.store.read().await;
        store
            .active
            .get(id)
            .or_else(|| store.archived.get(id))
            .cloned()
            .ok_or_else(|| Error::PlanNotFound(id.clone()))
    }

    /// Apply an external task update and return the updated plan.
    ///
    /// In lenient mode an unknown plan id yields a synthetic single-task
    /// placeholder plan under that id, and an unknown task id yields a
    /// placeholder task with the `"unknown"` capability; both are logged
    /// as warnings. In strict mode unknown references are rejected, as is
    /// any overwrite that moves a task away from a terminal status.
    pub async fn apply_task_update(
        &self,
        plan_id: &PlanId,
        task_id: &TaskId,
        update: TaskUpdate,
    ) -> Result<ExecutionPlan> {
        let mut store = self.store.write().await;

        if !store.active.contains_key(plan_id) {
            if self.policy == RecoveryPolicy::Strict {
                return Err(Error::PlanNotFound(plan_id.clone()));
            }
            tlog_warn!(
                "Update for unknown plan {}, synthesizing placeholder",
                plan_id
            );
            store
                .active
                .insert(plan_id.clone(), Self::placeholder_plan(plan_id, task_id));
        }

        // The entry is guaranteed above.
        let plan = store
            .active
            .get_mut(plan_id)
            .ok_or_else(|| Error::PlanNotFound(plan_id.clone()))?;

        if !plan.contains_task(task_id) {
            if self.policy == RecoveryPolicy::Strict {
                return Err(Error::TaskNotFound {
                    plan_id: plan_id.clone(),
                    task_id: task_id.clone(),
                });
            }
            tlog_warn!(
                "Update for unknown task {} in plan {}, synthesizing placeholder",
                task_id,
                plan_id.short()
            );
            plan.add_task(Self::placeholder_task(task_id));
        }

        if let Some(current) = plan.task(task_id).map(|t| t.status) {
            if current.is_terminal() && update.status != current {
                match self.policy {
                    RecoveryPolicy::Strict => {
                        return Err(Error::InvalidTransition {
                            from: current.to_string(),
                            to: update.status.to_string(),
                        });
                    }
                    RecoveryPolicy::Lenient => {
                        tlog_warn!(
                            "Task {} overwritten from terminal status {} to {}",
                            task_id,
                            current,
                            update.status
                        );
                    }
                }
            }
        }

        plan.update_task_status(task_id, &update)?;
        tlog!(
            "Task {} in plan {} -> {} (plan now {})",
            task_id.short(),
            plan_id.short(),
            update.status,
            plan.status()
        );
        Ok(plan.clone())
    }

    /// Move a plan from the active store to the bounded archive.
    ///
    /// When the archive exceeds its capacity, the archived plan with the
    /// oldest `created_at` is evicted.
    pub async fn archive_plan(&self, plan_id: &PlanId) -> Result<()> {
        let mut store = self.store.write().await;
        let plan = store
            .active
            .remove(plan_id)
            .ok_or_else(|| Error::PlanNotFound(plan_id.clone()))?;
        tlog!("Archived plan {}", plan_id.short());
        store.archived.insert(plan_id.clone(), plan);

        while store.archived.len() > self.max_history_size {
            let oldest = store
                .archived
                .iter()
                .min_by_key(|(_, p)| p.created_at)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    tlog_warn!("History full, evicting archived plan {}", id.short());
                    store.archived.remove(&id);
                }
                None => break,
            }
        }
        Ok(())
    }

    /// Derive a brand-new plan from an existing one.
    ///
    /// Re-runs plan creation with the original request text and a context
    /// annotated with the source plan id and the replan reason. The
    /// original plan is left untouched; archiving it is the caller's
    /// decision.
    pub async fn replan(&self, plan_id: &PlanId, reason: &str) -> Result<ExecutionPlan> {
        let original_request = {
            let store = self.store.read().await;
            store
                .active
                .get(plan_id)
                .or_else(|| store.archived.get(plan_id))
                .map(|p| p.original_request.clone())
                .ok_or_else(|| Error::PlanNotFound(plan_id.clone()))?
        };

        let mut context = HashMap::new();
        context.insert("original_plan_id".to_string(), json!(plan_id.0));
        context.insert("replan_reason".to_string(), json!(reason));

        let new_plan = self.create_plan(&original_request, &context).await?;
        tlog!(
            "Replanned {} -> {} ({})",
            plan_id.short(),
            new_plan.id.short(),
            reason
        );
        Ok(new_plan)
    }

    /// List the tasks in a plan that are ready to be executed.
    pub async fn ready_tasks(&self, plan_id: &PlanId) -> Result<Vec<Task>> {
        let store = self.store.read().await;
        let plan = store
            .active
            .get(plan_id)
            .or_else(|| store.archived.get(plan_id))
            .ok_or_else(|| Error::PlanNotFound(plan_id.clone()))?;
        Ok(plan.ready_tasks().into_iter().cloned().collect())
    }

    /// Human-readable step listing of a plan in execution order.
    pub async fn plan_summary(&self, plan_id: &PlanId) -> Result<String> {
        let plan = self.get_plan(plan_id).await?;

        let mut lines = vec![format!(
            "Plan {} with {} tasks:",
            plan.id,
            plan.task_count()
        )];
        for (i, task_id) in plan.execution_order().iter().enumerate() {
            if let Some(task) = plan.task(task_id) {
                lines.push(format!(
                    "- Step {}: {} (capabilities: {})",
                    i + 1,
                    task.description,
                    task.required_capabilities.join(", ")
                ));
            }
        }
        Ok(lines.join("\n"))
    }

    pub async fn active_count(&self) -> usize {
        self.store.read().await.active.len()
    }

    pub async fn archived_count(&self) -> usize {
        self.store.read().await.archived.len()
    }

    fn placeholder_plan(plan_id: &PlanId, task_id: &TaskId) -> ExecutionPlan {
        let mut plan = ExecutionPlan::new("recovered from external update")
            .with_id(plan_id.clone());
        plan.add_task(Self::placeholder_task(task_id));
        plan
    }

    fn placeholder_task(task_id: &TaskId) -> Task {
        Task::new("recovered from external update")
            .with_id(task_id.clone())
            .with_capabilities(vec!["unknown".to_string()])
    }
}
