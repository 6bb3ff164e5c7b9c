//! Shared helpers for in-memory store integration tests.

use boardflow::task::{
    adapters::memory::InMemoryTaskStore,
    domain::{DependencySet, NativeStatus, Task, TaskId, TaskMetadata, WorkflowStatus},
    ports::WriteMode,
    services::{RetryPolicy, WorkflowService},
};
use mockable::DefaultClock;
use std::sync::Arc;
use std::time::Duration;

/// Service type used throughout the in-memory suites.
pub type TestService = WorkflowService<InMemoryTaskStore, DefaultClock>;

/// Builds a task identifier.
///
/// # Panics
///
/// Panics when `value` is zero.
#[must_use]
pub fn id(value: u64) -> TaskId {
    TaskId::new(value).expect("test ids are positive")
}

/// Builds a task titled `Task N` with the given status and dependencies.
#[must_use]
pub fn task(value: u64, status: WorkflowStatus, dependencies: &[u64]) -> Task {
    Task::new(id(value), TaskMetadata::titled(format!("Task {value}")))
        .with_dependencies(dependencies.iter().copied().map(id).collect::<DependencySet>())
        .with_status(status)
}

/// Creates a service over `store` that retries without sleeping.
#[must_use]
pub fn service_for(store: &InMemoryTaskStore) -> TestService {
    WorkflowService::new(Arc::new(store.clone()), Arc::new(DefaultClock))
        .with_retry_policy(RetryPolicy::new(3, Duration::ZERO, Duration::ZERO))
}

/// Creates a simulating service over `store`.
#[must_use]
pub fn simulating_service_for(store: &InMemoryTaskStore) -> TestService {
    service_for(store).with_write_mode(WriteMode::Simulate)
}

/// Returns the stored workflow and native status of task `value`.
///
/// # Errors
///
/// Returns an error when the task is missing from the store.
pub fn stored_status(
    store: &InMemoryTaskStore,
    value: u64,
) -> Result<(WorkflowStatus, Option<NativeStatus>), eyre::Report> {
    let stored = store
        .task(id(value))
        .ok_or_else(|| eyre::eyre!("task #{value} missing from store"))?;
    Ok((stored.status(), stored.native_status()))
}
