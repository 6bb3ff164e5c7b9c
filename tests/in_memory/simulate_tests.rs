//! In-memory integration tests for simulated writes.

use super::helpers::{id, simulating_service_for, stored_status, task};
use boardflow::task::{
    adapters::memory::InMemoryTaskStore,
    domain::{NativeStatus, WorkflowStatus},
    ports::WriteMode,
};
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn simulated_start_reports_the_change_without_making_it() {
    let store = InMemoryTaskStore::with_tasks([task(1, WorkflowStatus::Ready, &[])]);
    let svc = simulating_service_for(&store);
    assert_eq!(svc.write_mode(), WriteMode::Simulate);

    let report = svc.start(id(1)).await.expect("simulation succeeds");

    assert!(report.simulated);
    assert_eq!(report.status, WorkflowStatus::InProgress);
    assert_eq!(report.native_status, Some(NativeStatus::InProgress));
    assert_eq!(
        stored_status(&store, 1).expect("task 1 stored"),
        (WorkflowStatus::Ready, Some(NativeStatus::Todo))
    );
    assert!(store.annotations(id(1)).is_empty());
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn simulated_completion_still_computes_unblocking() {
    let store = InMemoryTaskStore::with_tasks([
        task(1, WorkflowStatus::InProgress, &[]),
        task(2, WorkflowStatus::Blocked, &[1]),
        task(3, WorkflowStatus::Blocked, &[1, 2]),
    ]);
    let revision = store.revision();

    let report = simulating_service_for(&store)
        .complete_direct(id(1), "")
        .await
        .expect("simulation succeeds");

    assert!(report.simulated);
    assert_eq!(report.unblocked, vec![id(2)]);
    assert_eq!(store.revision(), revision);
    assert_eq!(
        stored_status(&store, 2).expect("task 2 stored").0,
        WorkflowStatus::Blocked
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn simulated_rejections_match_real_ones() {
    let store = InMemoryTaskStore::with_tasks([
        task(1, WorkflowStatus::InProgress, &[]),
        task(2, WorkflowStatus::Ready, &[]),
    ]);

    let err = simulating_service_for(&store)
        .start(id(2))
        .await
        .expect_err("slot is taken");

    assert_eq!(err.blocking_ids(), vec![id(1)]);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn simulated_declaration_and_reconcile_leave_the_board_alone() {
    let store = InMemoryTaskStore::with_tasks([
        task(1, WorkflowStatus::Done, &[]),
        task(2, WorkflowStatus::Blocked, &[]),
        task(3, WorkflowStatus::Ready, &[]).with_native_status(Some(NativeStatus::Done)),
    ]);
    let svc = simulating_service_for(&store);

    let declared = svc
        .declare_dependencies(id(2), "#1")
        .await
        .expect("simulation succeeds");
    assert_eq!(declared.status, WorkflowStatus::Ready);

    let reconciled = svc.reconcile().await.expect("simulation succeeds");
    assert!(reconciled.simulated);
    assert_eq!(reconciled.corrected.len(), 1);

    assert_eq!(store.revision().value(), 0);
    assert!(
        store
            .task(id(2))
            .is_some_and(|stored| stored.dependencies().is_empty())
    );
    assert_eq!(
        stored_status(&store, 3).expect("task 3 stored").1,
        Some(NativeStatus::Done)
    );
}
