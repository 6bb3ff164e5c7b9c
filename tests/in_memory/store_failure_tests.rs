//! In-memory integration tests for store failures, drift and races.

use super::helpers::{id, service_for, stored_status, task};
use boardflow::task::{
    adapters::memory::{FaultTarget, InMemoryTaskStore},
    domain::{NativeStatus, SyncDriftError, TaskDomainError, WorkflowStatus},
    services::{ErrorKind, WorkflowError},
};
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn transient_failures_are_retried_until_the_write_lands() {
    let store = InMemoryTaskStore::with_tasks([task(1, WorkflowStatus::Ready, &[])]);
    store.fail_transiently(FaultTarget::WorkflowField, 2);

    let report = service_for(&store)
        .start(id(1))
        .await
        .expect("third attempt succeeds");

    assert_eq!(report.status, WorkflowStatus::InProgress);
    assert_eq!(
        stored_status(&store, 1).expect("task 1 stored"),
        (WorkflowStatus::InProgress, Some(NativeStatus::InProgress))
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn exhausted_retries_fail_without_touching_the_task() {
    let store = InMemoryTaskStore::with_tasks([task(1, WorkflowStatus::Ready, &[])]);
    store.fail_transiently(FaultTarget::WorkflowField, 3);

    let err = service_for(&store)
        .start(id(1))
        .await
        .expect_err("every attempt fails");

    assert_eq!(err.kind(), ErrorKind::FatalStore);
    assert!(!err.is_retryable());
    assert!(err.to_string().contains("after 3 attempts"));
    assert_eq!(
        stored_status(&store, 1).expect("task 1 stored").0,
        WorkflowStatus::Ready
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unreadable_board_fails_before_any_write() {
    let store = InMemoryTaskStore::with_tasks([task(1, WorkflowStatus::Ready, &[])]);
    store.fail_permanently(FaultTarget::Read);
    let revision = store.revision();

    let err = service_for(&store)
        .start(id(1))
        .await
        .expect_err("board cannot be read");

    assert_eq!(err.kind(), ErrorKind::FatalStore);
    assert_eq!(err.task_id(), Some(id(1)));
    assert_eq!(store.revision(), revision);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn failed_native_write_is_reported_as_drift_and_reconciled_later() {
    let store = InMemoryTaskStore::with_tasks([task(1, WorkflowStatus::Ready, &[])]);
    store.fail_transiently(FaultTarget::NativeField, 3);
    let svc = service_for(&store);

    let report = svc
        .start(id(1))
        .await
        .expect("workflow field is authoritative");

    let expected_drift = SyncDriftError {
        task_id: id(1),
        expected: NativeStatus::InProgress,
        actual: Some(NativeStatus::Todo),
    };
    assert_eq!(report.status, WorkflowStatus::InProgress);
    assert_eq!(report.drift, vec![expected_drift]);
    assert_eq!(
        stored_status(&store, 1).expect("task 1 stored"),
        (WorkflowStatus::InProgress, Some(NativeStatus::Todo))
    );

    let reconciled = svc.reconcile().await.expect("reconcile should succeed");

    assert_eq!(reconciled.examined, 1);
    assert_eq!(reconciled.corrected, vec![expected_drift]);
    assert!(reconciled.failed.is_empty());
    assert_eq!(
        stored_status(&store, 1).expect("task 1 stored"),
        (WorkflowStatus::InProgress, Some(NativeStatus::InProgress))
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn reconcile_reports_tasks_it_could_not_fix() {
    let store = InMemoryTaskStore::with_tasks([
        task(1, WorkflowStatus::Done, &[]).with_native_status(Some(NativeStatus::InProgress)),
        task(2, WorkflowStatus::Ready, &[]).with_native_status(None),
        task(3, WorkflowStatus::Ready, &[]),
    ]);
    store.fail_permanently_for(FaultTarget::NativeField, id(2));

    let report = service_for(&store)
        .reconcile()
        .await
        .expect("board is readable");

    assert_eq!(report.examined, 3);
    assert_eq!(
        report
            .corrected
            .iter()
            .map(|drift| drift.task_id)
            .collect::<Vec<_>>(),
        vec![id(1)]
    );
    let failure = report.failed.first().expect("task 2 failure recorded");
    assert_eq!(failure.task_id, id(2));
    assert_eq!(failure.error_kind, ErrorKind::FatalStore);
    assert_eq!(
        stored_status(&store, 2).expect("task 2 stored").1,
        None
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn reconcile_of_consistent_board_changes_nothing() {
    let store = InMemoryTaskStore::with_tasks([
        task(1, WorkflowStatus::Ready, &[]),
        task(2, WorkflowStatus::Done, &[]),
    ]);
    let revision = store.revision();

    let report = service_for(&store)
        .reconcile()
        .await
        .expect("reconcile should succeed");

    assert_eq!(report.examined, 2);
    assert!(report.corrected.is_empty());
    assert_eq!(store.revision(), revision);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn concurrent_start_of_another_task_is_a_conflict() {
    let store = InMemoryTaskStore::with_tasks([
        task(1, WorkflowStatus::Ready, &[]),
        task(3, WorkflowStatus::Ready, &[]),
    ]);
    store.interleave_status_change(id(3), WorkflowStatus::InProgress);

    let err = service_for(&store)
        .start(id(1))
        .await
        .expect_err("task 3 won the race");

    assert!(matches!(
        err,
        WorkflowError::Domain(TaskDomainError::Conflict { task_id, active_task_id })
            if task_id == id(1) && active_task_id == id(3)
    ));
    assert_eq!(
        stored_status(&store, 1).expect("task 1 stored").0,
        WorkflowStatus::Ready
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unrelated_change_during_start_asks_the_caller_to_retry() {
    let store = InMemoryTaskStore::with_tasks([
        task(1, WorkflowStatus::Ready, &[]),
        task(2, WorkflowStatus::Backlog, &[]),
    ]);
    store.interleave_status_change(id(2), WorkflowStatus::Ready);

    let err = service_for(&store)
        .start(id(1))
        .await
        .expect_err("board moved under the start");

    assert!(matches!(err, WorkflowError::BoardChanged { task_id } if task_id == id(1)));
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(
        stored_status(&store, 1).expect("task 1 stored").0,
        WorkflowStatus::Ready
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unguarded_transitions_ignore_concurrent_changes() {
    let store = InMemoryTaskStore::with_tasks([
        task(1, WorkflowStatus::InProgress, &[]),
        task(2, WorkflowStatus::Backlog, &[]),
    ]);
    store.interleave_status_change(id(2), WorkflowStatus::Ready);

    let report = service_for(&store)
        .submit_for_review(id(1), "")
        .await
        .expect("only starts are guarded");

    assert_eq!(report.status, WorkflowStatus::Review);
}
