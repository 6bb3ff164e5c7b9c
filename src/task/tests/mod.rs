//! Unit tests for the task workflow module.


use crate::task::domain::{DependencySet, Task, TaskId, TaskMetadata, WorkflowStatus};

pub(super) fn id(value: u64) -> TaskId {
    TaskId::new(value).expect("test ids are positive")
}

pub(super) fn task(value: u64, status: WorkflowStatus, dependencies: &[u64]) -> Task {
    Task::new(id(value), TaskMetadata::titled(format!("Task {value}")))
        .with_dependencies(dependencies.iter().copied().map(id).collect::<DependencySet>())
        .with_status(status)
}
