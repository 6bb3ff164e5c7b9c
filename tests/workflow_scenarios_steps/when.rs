//! When steps for workflow BDD scenarios.

use super::world::{WorkflowWorld, task_id};
use boardflow::task::services::WorkflowCommand;
use rstest_bdd_macros::when;

#[when("task {value:u64} is started")]
fn task_is_started(world: &mut WorkflowWorld, value: u64) -> Result<(), eyre::Report> {
    world.execute(WorkflowCommand::Start {
        task_id: task_id(value)?,
    });
    Ok(())
}

#[when("task {value:u64} is submitted for review")]
fn task_is_submitted(world: &mut WorkflowWorld, value: u64) -> Result<(), eyre::Report> {
    world.execute(WorkflowCommand::SubmitForReview {
        task_id: task_id(value)?,
        message: "ready for a look".to_owned(),
    });
    Ok(())
}

#[when("task {value:u64} is approved")]
fn task_is_approved(world: &mut WorkflowWorld, value: u64) -> Result<(), eyre::Report> {
    world.execute(WorkflowCommand::Approve {
        task_id: task_id(value)?,
        message: String::new(),
    });
    Ok(())
}

#[when("task {value:u64} is completed directly")]
fn task_is_completed(world: &mut WorkflowWorld, value: u64) -> Result<(), eyre::Report> {
    world.execute(WorkflowCommand::CompleteDirect {
        task_id: task_id(value)?,
        message: String::new(),
    });
    Ok(())
}

#[when("task {value:u64} is triaged")]
fn task_is_triaged(world: &mut WorkflowWorld, value: u64) -> Result<(), eyre::Report> {
    world.execute(WorkflowCommand::Triage {
        task_id: task_id(value)?,
    });
    Ok(())
}

#[when(r#"task {value:u64} declares dependencies "{declaration}""#)]
fn task_declares_dependencies(
    world: &mut WorkflowWorld,
    value: u64,
    declaration: String,
) -> Result<(), eyre::Report> {
    world.execute(WorkflowCommand::DeclareDependencies {
        task_id: task_id(value)?,
        declaration,
    });
    Ok(())
}
