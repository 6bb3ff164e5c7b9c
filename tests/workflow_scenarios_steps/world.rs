//! Shared world state for workflow BDD scenarios.

use std::sync::Arc;
use std::time::Duration;

use boardflow::task::{
    adapters::memory::InMemoryTaskStore,
    domain::{TaskId, parse_dependencies},
    ports::WriteMode,
    services::{RetryPolicy, TransitionOutcome, WorkflowCommand, WorkflowService},
};
use mockable::DefaultClock;
use rstest::fixture;

/// Service type used by the BDD world.
pub type TestWorkflowService = WorkflowService<InMemoryTaskStore, DefaultClock>;

/// Scenario world for workflow behaviour tests.
#[derive(Default)]
pub struct WorkflowWorld {
    pub store: InMemoryTaskStore,
    pub mode: WriteMode,
    pub last_outcome: Option<TransitionOutcome>,
}

impl WorkflowWorld {
    /// Builds a service over the scenario board in the scenario's write mode.
    #[must_use]
    pub fn service(&self) -> TestWorkflowService {
        WorkflowService::new(Arc::new(self.store.clone()), Arc::new(DefaultClock))
            .with_retry_policy(RetryPolicy::new(3, Duration::ZERO, Duration::ZERO))
            .with_write_mode(self.mode)
    }

    /// Executes `command` and records its outcome.
    pub fn execute(&mut self, command: WorkflowCommand) {
        let outcome = run_async(self.service().execute(&command));
        self.last_outcome = Some(outcome);
    }

    /// Returns the outcome of the most recent command.
    ///
    /// # Errors
    ///
    /// Returns an error when no command has run yet.
    pub fn outcome(&self) -> Result<&TransitionOutcome, eyre::Report> {
        self.last_outcome
            .as_ref()
            .ok_or_else(|| eyre::eyre!("no command has run in this scenario"))
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> WorkflowWorld {
    WorkflowWorld::default()
}

/// Parses a task number from a step.
///
/// # Errors
///
/// Returns an error when `value` is zero.
pub fn task_id(value: u64) -> Result<TaskId, eyre::Report> {
    TaskId::new(value).map_err(|err| eyre::eyre!("invalid task number in scenario: {err}"))
}

/// Parses a `#1, #2` list from a step.
///
/// # Errors
///
/// Returns an error when the list is malformed.
pub fn task_ids(list: &str) -> Result<Vec<TaskId>, eyre::Report> {
    let parsed =
        parse_dependencies(list).map_err(|err| eyre::eyre!("invalid id list in scenario: {err}"))?;
    Ok(parsed.iter().collect())
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
