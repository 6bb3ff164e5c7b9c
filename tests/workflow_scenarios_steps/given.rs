//! Given steps for workflow BDD scenarios.

use super::world::{WorkflowWorld, task_id};
use boardflow::task::{
    domain::{Task, TaskMetadata, WorkflowStatus, parse_dependencies},
    ports::WriteMode,
};
use rstest_bdd_macros::given;

fn seed(
    world: &WorkflowWorld,
    value: u64,
    status: &str,
    declaration: &str,
) -> Result<(), eyre::Report> {
    let workflow_status = WorkflowStatus::try_from(status)
        .map_err(|err| eyre::eyre!("invalid status in scenario: {err}"))?;
    let dependencies = parse_dependencies(declaration)
        .map_err(|err| eyre::eyre!("invalid dependencies in scenario: {err}"))?;
    let task = Task::new(task_id(value)?, TaskMetadata::titled(format!("Task {value}")))
        .with_dependencies(dependencies)
        .with_status(workflow_status);
    world.store.seed(task);
    Ok(())
}

#[given("writes are simulated")]
fn writes_are_simulated(world: &mut WorkflowWorld) {
    world.mode = WriteMode::Simulate;
}

#[given(r#"a "{status}" task {value:u64}"#)]
fn task_with_status(
    world: &mut WorkflowWorld,
    status: String,
    value: u64,
) -> Result<(), eyre::Report> {
    seed(world, value, &status, "")
}

#[given(r#"a "{status}" task {value:u64} depending on "{declaration}""#)]
fn task_with_dependencies(
    world: &mut WorkflowWorld,
    status: String,
    value: u64,
    declaration: String,
) -> Result<(), eyre::Report> {
    seed(world, value, &status, &declaration)
}
