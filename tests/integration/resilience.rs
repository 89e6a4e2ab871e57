//! Recovery-path integration tests.
//!
//! These tests feed the coordinator updates referencing unknown plans,
//! unknown tasks, and already-finished tasks, and verify the lenient
//! and strict policies behave as documented.

use std::collections::HashMap;

use serde_json::json;

use trellis::{
    Error, PlanCoordinator, PlanId, PlanStatus, RecoveryPolicy, TaskId, TaskStatus, TaskUpdate,
};

/// Test: Unknown plan recovery
/// Given a lenient coordinator with no plans
/// When an update arrives for an unknown plan and task
/// Then a placeholder plan with exactly one task is synthesized and the
/// update is applied to it
#[tokio::test]
async fn test_lenient_unknown_plan_synthesizes_placeholder() {
    let coordinator = PlanCoordinator::new(10);

    let plan = coordinator
        .apply_task_update(
            &PlanId::from("plan-from-the-past"),
            &TaskId::from("task-from-the-past"),
            TaskUpdate::completed(json!({"answer": 42})),
        )
        .await
        .unwrap();

    assert_eq!(plan.id, PlanId::from("plan-from-the-past"));
    assert_eq!(plan.task_count(), 1);
    assert_eq!(plan.status(), PlanStatus::Completed);
    let task = plan.task(&TaskId::from("task-from-the-past")).unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.result, Some(json!({"answer": 42})));
    assert_eq!(task.required_capabilities, vec!["unknown".to_string()]);
}

/// Test: Unknown task recovery inside a known plan
/// Given a lenient coordinator with one plan
/// When an update names a task the plan does not contain
/// Then a placeholder task is added and the original tasks are untouched
#[tokio::test]
async fn test_lenient_unknown_task_joins_existing_plan() {
    let coordinator = PlanCoordinator::new(10);
    let plan = coordinator
        .create_plan("Find the fastest route", &HashMap::new())
        .await
        .unwrap();
    let before = plan.task_count();

    let updated = coordinator
        .apply_task_update(
            &plan.id,
            &TaskId::from("straggler"),
            TaskUpdate::failed("lost"),
        )
        .await
        .unwrap();

    assert_eq!(updated.task_count(), before + 1);
    let straggler = updated.task(&TaskId::from("straggler")).unwrap();
    assert_eq!(straggler.status, TaskStatus::Failed);
    for original in plan.tasks() {
        assert!(updated.contains_task(&original.id));
    }
}

/// Test: Strict policy rejects unknown references
/// Given a strict coordinator
/// When updates name an unknown plan or task
/// Then typed errors are returned and no placeholders appear
#[tokio::test]
async fn test_strict_rejects_unknown_references() {
    let coordinator = PlanCoordinator::new(10).with_policy(RecoveryPolicy::Strict);

    let missing_plan = coordinator
        .apply_task_update(
            &PlanId::from("nope"),
            &TaskId::from("nope"),
            TaskUpdate::status(TaskStatus::InProgress),
        )
        .await;
    assert!(matches!(missing_plan, Err(Error::PlanNotFound(_))));
    assert_eq!(coordinator.active_count().await, 0);

    let plan = coordinator
        .create_plan("anything", &HashMap::new())
        .await
        .unwrap();
    let missing_task = coordinator
        .apply_task_update(
            &plan.id,
            &TaskId::from("nope"),
            TaskUpdate::status(TaskStatus::InProgress),
        )
        .await;
    assert!(matches!(missing_task, Err(Error::TaskNotFound { .. })));
    assert_eq!(
        coordinator.get_plan(&plan.id).await.unwrap().task_count(),
        plan.task_count()
    );
}

/// Test: Duplicate terminal updates are idempotent
/// Given a task already completed with a result
/// When the identical completion arrives again
/// Then both the task and plan state are unchanged
#[tokio::test]
async fn test_duplicate_completion_is_idempotent() {
    let coordinator = PlanCoordinator::new(10);
    let plan = coordinator
        .create_plan("Say hello", &HashMap::new())
        .await
        .unwrap();
    let task_id = plan.tasks()[0].id.clone();

    let first = coordinator
        .apply_task_update(&plan.id, &task_id, TaskUpdate::completed(json!("done")))
        .await
        .unwrap();
    let second = coordinator
        .apply_task_update(&plan.id, &task_id, TaskUpdate::completed(json!("done")))
        .await
        .unwrap();

    assert_eq!(
        first.task(&task_id).unwrap().status,
        second.task(&task_id).unwrap().status
    );
    assert_eq!(
        first.task(&task_id).unwrap().result,
        second.task(&task_id).unwrap().result
    );
    assert_eq!(first.status(), second.status());
    assert_eq!(first.task_count(), second.task_count());
}

/// Test: Terminal overwrite policies
/// Given a completed task
/// When a Pending update arrives
/// Then strict mode rejects it and lenient mode applies it with the plan
/// status re-derived
#[tokio::test]
async fn test_terminal_overwrite_policies_differ() {
    let strict = PlanCoordinator::new(10).with_policy(RecoveryPolicy::Strict);
    let plan = strict.create_plan("Say hello", &HashMap::new()).await.unwrap();
    let task_id = plan.tasks()[0].id.clone();
    strict
        .apply_task_update(&plan.id, &task_id, TaskUpdate::completed(json!(null)))
        .await
        .unwrap();
    let rejected = strict
        .apply_task_update(&plan.id, &task_id, TaskUpdate::status(TaskStatus::Pending))
        .await;
    assert!(matches!(rejected, Err(Error::InvalidTransition { .. })));

    let lenient = PlanCoordinator::new(10);
    let plan = lenient.create_plan("Say hello", &HashMap::new()).await.unwrap();
    let task_id = plan.tasks()[0].id.clone();
    lenient
        .apply_task_update(&plan.id, &task_id, TaskUpdate::completed(json!(null)))
        .await
        .unwrap();
    let accepted = lenient
        .apply_task_update(&plan.id, &task_id, TaskUpdate::status(TaskStatus::Pending))
        .await
        .unwrap();
    assert_eq!(accepted.task(&task_id).unwrap().status, TaskStatus::Pending);
    assert_eq!(accepted.status(), PlanStatus::Pending);
}

/// Test: Non-ASCII external ids are handled
/// Given a lenient coordinator
/// When an update arrives whose plan and task ids contain multi-byte
/// characters near the display-prefix cut
/// Then the update succeeds and a placeholder is synthesized normally
#[tokio::test]
async fn test_non_ascii_external_ids_are_accepted() {
    let coordinator = PlanCoordinator::new(10);

    let plan = coordinator
        .apply_task_update(
            &PlanId::from("plan-ü-äöü-xyz"),
            &TaskId::from("tâche-à-faire"),
            TaskUpdate::completed(json!("fini")),
        )
        .await
        .unwrap();

    assert_eq!(plan.id, PlanId::from("plan-ü-äöü-xyz"));
    let task = plan.task(&TaskId::from("tâche-à-faire")).unwrap();
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.result, Some(json!("fini")));
}

/// Test: Concurrent updates do not lose writes
/// Given one plan and many tasks updated from parallel tokio tasks
/// When all updates have settled
/// Then every task reflects its update
#[tokio::test]
async fn test_concurrent_updates_are_serialized() {
    use std::sync::Arc;

    let coordinator = Arc::new(PlanCoordinator::new(10));
    let plan = coordinator
        .create_plan("Implement a rate limiter", &HashMap::new())
        .await
        .unwrap();

    let mut handles = Vec::new();
    for task in plan.tasks() {
        let coordinator = Arc::clone(&coordinator);
        let plan_id = plan.id.clone();
        let task_id = task.id.clone();
        handles.push(tokio::spawn(async move {
            coordinator
                .apply_task_update(&plan_id, &task_id, TaskUpdate::completed(json!(null)))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let settled = coordinator.get_plan(&plan.id).await.unwrap();
    assert_eq!(settled.status(), PlanStatus::Completed);
}
