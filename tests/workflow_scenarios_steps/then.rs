//! Then steps for workflow BDD scenarios.

use super::world::{WorkflowWorld, task_id, task_ids};
use boardflow::task::domain::{NativeStatus, WorkflowStatus};
use rstest_bdd_macros::then;

#[then(r#"task {value:u64} is "{status}" with native status "{native}""#)]
fn task_has_statuses(
    world: &WorkflowWorld,
    value: u64,
    status: String,
    native: String,
) -> Result<(), eyre::Report> {
    let expected_status = WorkflowStatus::try_from(status.as_str())
        .map_err(|err| eyre::eyre!("invalid status in scenario: {err}"))?;
    let expected_native = NativeStatus::try_from(native.as_str())
        .map_err(|err| eyre::eyre!("invalid native status in scenario: {err}"))?;
    let stored = world
        .store
        .task(task_id(value)?)
        .ok_or_else(|| eyre::eyre!("task #{value} missing from the board"))?;

    eyre::ensure!(
        stored.status() == expected_status,
        "expected task #{value} to be {expected_status}, found {}",
        stored.status()
    );
    eyre::ensure!(
        stored.native_status() == Some(expected_native),
        "expected native status {expected_native}, found {:?}",
        stored.native_status()
    );
    Ok(())
}

#[then("task {value:u64} has no dependencies")]
fn task_has_no_dependencies(world: &WorkflowWorld, value: u64) -> Result<(), eyre::Report> {
    let stored = world
        .store
        .task(task_id(value)?)
        .ok_or_else(|| eyre::eyre!("task #{value} missing from the board"))?;
    eyre::ensure!(
        stored.dependencies().is_empty(),
        "expected no dependencies, found {}",
        stored.dependencies()
    );
    Ok(())
}

#[then(r#"the operation fails with "{kind}" naming "{ids}""#)]
fn operation_fails(world: &WorkflowWorld, kind: String, ids: String) -> Result<(), eyre::Report> {
    let outcome = world.outcome()?;
    eyre::ensure!(!outcome.ok, "expected failure, got {outcome:?}");

    let actual_kind = outcome
        .error_kind
        .ok_or_else(|| eyre::eyre!("failed outcome carries no error kind"))?;
    eyre::ensure!(
        actual_kind.as_str() == kind,
        "expected error kind {kind}, found {actual_kind}"
    );
    let expected_ids = task_ids(&ids)?;
    eyre::ensure!(
        outcome.blocking_ids == expected_ids,
        "expected blocking tasks {expected_ids:?}, found {:?}",
        outcome.blocking_ids
    );
    Ok(())
}

#[then(r#"the operation unblocked "{ids}""#)]
fn operation_unblocked(world: &WorkflowWorld, ids: String) -> Result<(), eyre::Report> {
    let outcome = world.outcome()?;
    eyre::ensure!(outcome.ok, "expected success, got {outcome:?}");
    let expected_ids = task_ids(&ids)?;
    eyre::ensure!(
        outcome.unblocked == expected_ids,
        "expected unblocked tasks {expected_ids:?}, found {:?}",
        outcome.unblocked
    );
    Ok(())
}
