//! Plan lifecycle integration tests.
//!
//! These tests drive a plan from creation through task completion,
//! archival, and replanning via the coordinator.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;

use trellis::{
    Error, PlanCoordinator, PlanId, PlanStatus, TaskStatus, TaskUpdate,
};

use crate::fixtures::{FailingDecomposer, ScriptedDecomposer};

/// Test: Full plan completion
/// Given a three-step plan
/// When each task is completed in execution order
/// Then the plan status progresses to Completed with timestamps set
#[tokio::test]
async fn test_plan_runs_to_completion() {
    let coordinator = PlanCoordinator::new(10);
    let plan = coordinator
        .create_plan("Implement a rate limiter", &HashMap::new())
        .await
        .unwrap();
    assert_eq!(plan.status(), PlanStatus::Pending);
    assert_eq!(plan.task_count(), 3);

    let order: Vec<_> = plan.execution_order().to_vec();
    let mut latest = plan;
    for (i, task_id) in order.iter().enumerate() {
        latest = coordinator
            .apply_task_update(&latest.id, task_id, TaskUpdate::started("worker-1"))
            .await
            .unwrap();
        assert_eq!(latest.status(), PlanStatus::InProgress);

        latest = coordinator
            .apply_task_update(&latest.id, task_id, TaskUpdate::completed(json!(i)))
            .await
            .unwrap();
    }

    assert_eq!(latest.status(), PlanStatus::Completed);
    assert!(latest.started_at.is_some());
    assert!(latest.completed_at.is_some());
    for task in latest.tasks() {
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.completed_at.is_some());
    }
}

/// Test: Failure dominates plan status
/// Given an in-progress plan
/// When one task fails while another is completed
/// Then the plan status is Failed regardless of other progress
#[tokio::test]
async fn test_single_failure_fails_plan() {
    let coordinator = PlanCoordinator::new(10);
    let plan = coordinator
        .create_plan("Implement a rate limiter", &HashMap::new())
        .await
        .unwrap();
    let order: Vec<_> = plan.execution_order().to_vec();

    coordinator
        .apply_task_update(&plan.id, &order[0], TaskUpdate::completed(json!("ok")))
        .await
        .unwrap();
    let latest = coordinator
        .apply_task_update(&plan.id, &order[1], TaskUpdate::failed("out of memory"))
        .await
        .unwrap();

    assert_eq!(latest.status(), PlanStatus::Failed);
    let failed = latest.task(&order[1]).unwrap();
    assert_eq!(failed.error, Some("out of memory".to_string()));
}

/// Test: Archive bound eviction
/// Given a coordinator with history capacity 2
/// When three plans are archived
/// Then the plan with the oldest creation time is no longer retrievable
#[tokio::test]
async fn test_archive_evicts_oldest_beyond_capacity() {
    let coordinator = PlanCoordinator::new(2);
    let mut ids = Vec::new();
    for request in ["first", "second", "third"] {
        let plan = coordinator.create_plan(request, &HashMap::new()).await.unwrap();
        ids.push(plan.id.clone());
        coordinator.archive_plan(&plan.id).await.unwrap();
    }

    assert_eq!(coordinator.archived_count().await, 2);
    assert!(matches!(
        coordinator.get_plan(&ids[0]).await,
        Err(Error::PlanNotFound(_))
    ));
    assert!(coordinator.get_plan(&ids[1]).await.is_ok());
    assert!(coordinator.get_plan(&ids[2]).await.is_ok());
}

/// Test: Archived plans remain readable
/// Given an archived plan
/// When it is fetched and summarized
/// Then its content is intact
#[tokio::test]
async fn test_archived_plan_is_readable() {
    let coordinator = PlanCoordinator::new(10);
    let plan = coordinator
        .create_plan("Research crab migration", &HashMap::new())
        .await
        .unwrap();
    coordinator.archive_plan(&plan.id).await.unwrap();

    let fetched = coordinator.get_plan(&plan.id).await.unwrap();
    assert_eq!(fetched.task_count(), plan.task_count());

    let summary = coordinator.plan_summary(&plan.id).await.unwrap();
    assert!(summary.contains("- Step 1:"));
}

/// Test: Replan from an archived plan
/// Given a plan that was archived after a failure
/// When replan is called with a reason
/// Then a new active plan carries the original request and the
/// annotation context on every task
#[tokio::test]
async fn test_replan_after_archive() {
    let coordinator = PlanCoordinator::new(10).with_decomposer(Arc::new(ScriptedDecomposer {
        descriptions: vec!["step one", "step two"],
    }));
    let plan = coordinator
        .create_plan("ship the release", &HashMap::new())
        .await
        .unwrap();
    coordinator.archive_plan(&plan.id).await.unwrap();

    let new_plan = coordinator.replan(&plan.id, "validation failed").await.unwrap();

    assert_ne!(new_plan.id, plan.id);
    assert_eq!(new_plan.original_request, "ship the release");
    assert_eq!(new_plan.status(), PlanStatus::Pending);
    for task in new_plan.tasks() {
        assert_eq!(
            task.context.get("original_plan_id"),
            Some(&json!(plan.id.0))
        );
        assert_eq!(
            task.context.get("replan_reason"),
            Some(&json!("validation failed"))
        );
    }
    assert_eq!(coordinator.active_count().await, 1);
    assert_eq!(coordinator.archived_count().await, 1);
}

/// Test: Decomposition failure aborts plan creation
/// Given a decomposer that always fails
/// When create_plan is called
/// Then the error propagates and no partial plan is stored
#[tokio::test]
async fn test_failed_decomposition_stores_no_plan() {
    let coordinator = PlanCoordinator::new(10).with_decomposer(Arc::new(FailingDecomposer));

    let result = coordinator.create_plan("anything", &HashMap::new()).await;

    assert!(matches!(result, Err(Error::Decomposition(_))));
    assert_eq!(coordinator.active_count().await, 0);
}

/// Test: Replanning an unknown plan
/// Given an empty coordinator
/// When replan is called with a made-up id
/// Then PlanNotFound is returned and nothing is created
#[tokio::test]
async fn test_replan_unknown_plan_creates_nothing() {
    let coordinator = PlanCoordinator::new(10);

    let result = coordinator.replan(&PlanId::from("ghost"), "because").await;

    assert!(matches!(result, Err(Error::PlanNotFound(_))));
    assert_eq!(coordinator.active_count().await, 0);
}
