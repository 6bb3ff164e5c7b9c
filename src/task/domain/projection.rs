//! Projection of the workflow status onto the native status field.

use super::{NativeStatus, Task, TaskId, WorkflowStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Maps a workflow status onto its native compatibility status.
#[must_use]
pub const fn project(status: WorkflowStatus) -> NativeStatus {
    match status {
        WorkflowStatus::Backlog | WorkflowStatus::Ready | WorkflowStatus::Blocked => {
            NativeStatus::Todo
        }
        WorkflowStatus::InProgress | WorkflowStatus::Review => NativeStatus::InProgress,
        WorkflowStatus::Done => NativeStatus::Done,
    }
}

/// The pair of external field values for one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPair {
    /// Workflow field value.
    pub workflow: WorkflowStatus,
    /// Native field value, `None` when unset.
    pub native: Option<NativeStatus>,
}

impl StatusPair {
    /// Returns the consistent pair for a workflow status.
    #[must_use]
    pub const fn expected(workflow: WorkflowStatus) -> Self {
        Self {
            workflow,
            native: Some(project(workflow)),
        }
    }

    /// Returns the pair a task was read with.
    #[must_use]
    pub const fn observed(task: &Task) -> Self {
        Self {
            workflow: task.status(),
            native: task.native_status(),
        }
    }

    /// Returns whether the native field matches the projection.
    #[must_use]
    pub fn is_consistent(self) -> bool {
        self.native == Some(project(self.workflow))
    }
}

/// Returns whether a freshly read task's native field has drifted from the
/// projection of its workflow field.
#[must_use]
pub fn detect_drift(task: &Task) -> bool {
    !StatusPair::observed(task).is_consistent()
}

/// The native field of a task disagrees with its workflow field.
///
/// Drift never fails the operation that caused it. It is reported so a
/// reconciliation pass can rewrite the native field.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncDriftError {
    /// Task whose fields disagree.
    pub task_id: TaskId,
    /// Native status the workflow field projects to.
    pub expected: NativeStatus,
    /// Native status last confirmed by the store.
    pub actual: Option<NativeStatus>,
}

impl SyncDriftError {
    /// Describes the drift of a task, or `None` when its fields agree.
    #[must_use]
    pub fn for_task(task: &Task) -> Option<Self> {
        detect_drift(task).then(|| Self {
            task_id: task.id(),
            expected: project(task.status()),
            actual: task.native_status(),
        })
    }
}

impl fmt::Display for SyncDriftError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let actual = self.actual.map_or("unset", NativeStatus::as_str);
        write!(
            f,
            "task {}: native status drifted (expected {}, found {actual})",
            self.task_id, self.expected
        )
    }
}
