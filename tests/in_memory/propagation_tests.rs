//! In-memory integration tests for unblocking dependents after completion.

use super::helpers::{id, service_for, stored_status, task};
use boardflow::task::{
    adapters::memory::{FaultTarget, InMemoryTaskStore},
    domain::{NativeStatus, WorkflowStatus},
    services::ErrorKind,
};
use rstest::rstest;

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn linear_chain_unblocks_one_link_per_completion() {
    let store = InMemoryTaskStore::with_tasks([
        task(1, WorkflowStatus::Ready, &[]),
        task(2, WorkflowStatus::Blocked, &[1]),
        task(3, WorkflowStatus::Blocked, &[2]),
    ]);
    let svc = service_for(&store);

    svc.start(id(1)).await.expect("start 1");
    let first = svc.complete_direct(id(1), "").await.expect("complete 1");
    assert_eq!(first.unblocked, vec![id(2)]);
    assert_eq!(
        stored_status(&store, 3).expect("task 3 stored").0,
        WorkflowStatus::Blocked
    );

    svc.start(id(2)).await.expect("start 2");
    svc.submit_for_review(id(2), "").await.expect("review 2");
    let second = svc.approve(id(2), "").await.expect("approve 2");
    assert_eq!(second.unblocked, vec![id(3)]);

    svc.start(id(3)).await.expect("start 3");
    let third = svc.complete_direct(id(3), "").await.expect("complete 3");
    assert!(third.unblocked.is_empty());
    for value in 1..=3 {
        assert_eq!(
            stored_status(&store, value).expect("task stored"),
            (WorkflowStatus::Done, Some(NativeStatus::Done))
        );
    }
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn only_dependents_with_every_dependency_done_are_unblocked() {
    let store = InMemoryTaskStore::with_tasks([
        task(1, WorkflowStatus::InProgress, &[]),
        task(2, WorkflowStatus::Blocked, &[1]),
        task(3, WorkflowStatus::Blocked, &[1]),
        task(4, WorkflowStatus::Blocked, &[1, 5]),
        task(5, WorkflowStatus::Ready, &[]),
    ]);

    let report = service_for(&store)
        .complete_direct(id(1), "")
        .await
        .expect("completion should succeed");

    assert_eq!(report.unblocked, vec![id(2), id(3)]);
    assert_eq!(
        stored_status(&store, 4).expect("task 4 stored").0,
        WorkflowStatus::Blocked
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn backlog_dependents_wait_for_triage() {
    let store = InMemoryTaskStore::with_tasks([
        task(1, WorkflowStatus::InProgress, &[]),
        task(2, WorkflowStatus::Backlog, &[1]),
    ]);
    let svc = service_for(&store);

    let report = svc.complete_direct(id(1), "").await.expect("complete");
    assert!(report.unblocked.is_empty());
    assert_eq!(
        stored_status(&store, 2).expect("task 2 stored").0,
        WorkflowStatus::Backlog
    );

    let triaged = svc.triage(id(2)).await.expect("triage");
    assert_eq!(triaged.status, WorkflowStatus::Ready);
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn a_failing_dependent_does_not_stop_the_others() {
    let store = InMemoryTaskStore::with_tasks([
        task(1, WorkflowStatus::InProgress, &[]),
        task(2, WorkflowStatus::Blocked, &[1]),
        task(3, WorkflowStatus::Blocked, &[1]),
    ]);
    store.fail_permanently_for(FaultTarget::WorkflowField, id(2));

    let report = service_for(&store)
        .complete_direct(id(1), "")
        .await
        .expect("completion itself succeeds");

    assert_eq!(report.status, WorkflowStatus::Done);
    assert_eq!(report.unblocked, vec![id(3)]);
    let failure = report
        .propagation_failures
        .first()
        .expect("task 2 failure recorded");
    assert_eq!(failure.task_id, id(2));
    assert_eq!(failure.error_kind, ErrorKind::FatalStore);
    assert_eq!(
        stored_status(&store, 2).expect("task 2 stored").0,
        WorkflowStatus::Blocked
    );
    assert_eq!(
        stored_status(&store, 1).expect("task 1 stored").0,
        WorkflowStatus::Done
    );
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn unblocked_dependents_receive_an_annotation() {
    let store = InMemoryTaskStore::with_tasks([
        task(1, WorkflowStatus::InProgress, &[]),
        task(2, WorkflowStatus::Blocked, &[1]),
    ]);

    service_for(&store)
        .complete_direct(id(1), "")
        .await
        .expect("completion should succeed");

    let notes = store.annotations(id(2));
    assert_eq!(notes.len(), 1);
    assert!(notes.iter().all(|note| note.contains("#1")));
}

#[rstest]
#[tokio::test(flavor = "multi_thread")]
async fn annotation_failures_become_warnings() {
    let store = InMemoryTaskStore::with_tasks([
        task(1, WorkflowStatus::InProgress, &[]),
        task(2, WorkflowStatus::Blocked, &[1]),
    ]);
    store.fail_permanently(FaultTarget::Annotation);

    let report = service_for(&store)
        .complete_direct(id(1), "")
        .await
        .expect("completion should succeed");

    assert_eq!(report.unblocked, vec![id(2)]);
    assert_eq!(report.warnings.len(), 2);
    assert!(store.annotations(id(1)).is_empty());
}
