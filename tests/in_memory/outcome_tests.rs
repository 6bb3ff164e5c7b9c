//! In-memory integration tests for structured operation results.

use super::helpers::{id, service_for, task};
use boardflow::task::{
    adapters::memory::{FaultTarget, InMemoryTaskStore},
    domain::{NativeStatus, WorkflowStatus},
    services::{ErrorKind, WorkflowCommand},
};
use rstest::rstest;
use serde_json::json;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn successful_command_reports_new_status_and_unblocked_tasks() {
    let store = InMemoryTaskStore::with_tasks([
        task(1, WorkflowStatus::Review, &[]),
        task(2, WorkflowStatus::Blocked, &[1]),
    ]);

    let outcome = service_for(&store)
        .execute(&WorkflowCommand::Approve {
            task_id: id(1),
            message: "merged".to_owned(),
        })
        .await;

    assert!(outcome.ok);
    assert_eq!(outcome.operation, "approve");
    assert_eq!(outcome.status, Some(WorkflowStatus::Done));
    assert_eq!(outcome.native_status, Some(NativeStatus::Done));
    assert_eq!(outcome.unblocked, vec![id(2)]);
    assert_eq!(outcome.error_kind, None);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn rejected_command_carries_the_confirmed_status() {
    let store = InMemoryTaskStore::with_tasks([
        task(1, WorkflowStatus::Ready, &[]),
        task(2, WorkflowStatus::Blocked, &[1]),
    ]);

    let outcome = service_for(&store)
        .execute(&WorkflowCommand::Start { task_id: id(2) })
        .await;

    let encoded = serde_json::to_value(&outcome).expect("outcome serializes");
    assert_eq!(
        encoded,
        json!({
            "operation": "start",
            "task_id": 2,
            "ok": false,
            "status": "blocked",
            "native_status": "todo",
            "error_kind": "unmet_dependency",
            "detail": "task #2 has unmet dependencies: #1",
            "blocking_ids": [1],
            "simulated": false
        })
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_command_on_unknown_task_has_no_status() {
    let store = InMemoryTaskStore::new();

    let outcome = service_for(&store)
        .execute(&WorkflowCommand::Triage { task_id: id(7) })
        .await;

    assert!(!outcome.ok);
    assert_eq!(outcome.error_kind, Some(ErrorKind::NotFound));
    assert_eq!(outcome.status, None);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn store_failure_is_classified_for_the_caller() {
    let store = InMemoryTaskStore::with_tasks([task(1, WorkflowStatus::InProgress, &[])]);
    store.fail_transiently(FaultTarget::WorkflowField, 3);

    let outcome = service_for(&store)
        .execute(&WorkflowCommand::SubmitForReview {
            task_id: id(1),
            message: String::new(),
        })
        .await;

    assert!(!outcome.ok);
    assert_eq!(outcome.error_kind, Some(ErrorKind::FatalStore));
    assert_eq!(outcome.status, Some(WorkflowStatus::InProgress));
}

#[rstest]
#[case::declare(
    WorkflowCommand::DeclareDependencies { task_id: id(2), declaration: "#1".to_owned() },
    "declare_dependencies",
    WorkflowStatus::Blocked
)]
#[case::force_ready(WorkflowCommand::ForceReady { task_id: id(2) }, "force_ready", WorkflowStatus::Ready)]
#[case::rework(
    WorkflowCommand::RequestRework { task_id: id(3), feedback: "split the module".to_owned() },
    "request_rework",
    WorkflowStatus::InProgress
)]
#[tokio::test(flavor = "multi_thread")]
async fn every_command_is_dispatched(
    #[case] command: WorkflowCommand,
    #[case] operation: &str,
    #[case] expected: WorkflowStatus,
) {
    let store = InMemoryTaskStore::with_tasks([
        task(1, WorkflowStatus::Ready, &[]),
        task(2, WorkflowStatus::Blocked, &[]),
        task(3, WorkflowStatus::Review, &[]),
    ]);

    let outcome = service_for(&store).execute(&command).await;

    assert!(outcome.ok, "{outcome:?}");
    assert_eq!(outcome.operation, operation);
    assert_eq!(outcome.task_id, command.task_id());
    assert_eq!(outcome.status, Some(expected));
}
