//! Error types for task domain validation and parsing.

use super::{Cycle, TaskId, WorkflowStatus};
use thiserror::Error;

/// Business-rule violations detected purely from in-memory state.
///
/// None of these are retryable: they are returned to the caller before any
/// external mutation is attempted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskDomainError {
    /// The task identifier is not a positive integer.
    #[error("invalid task id {0}, expected a positive integer")]
    InvalidTaskId(u64),

    /// The requested status change is not an edge of the workflow.
    #[error("task {task_id}: invalid transition {from} -> {to}")]
    InvalidTransition {
        /// Task the transition was requested for.
        task_id: TaskId,
        /// Current workflow status.
        from: WorkflowStatus,
        /// Requested workflow status.
        to: WorkflowStatus,
    },

    /// The task still has dependencies that are not done.
    #[error("task {task_id} has unmet dependencies: {}", format_ids(.unmet))]
    UnmetDependencies {
        /// Task the transition was requested for.
        task_id: TaskId,
        /// Dependencies whose status is not done, in ascending order.
        unmet: Vec<TaskId>,
    },

    /// Another task already occupies the single active slot.
    #[error("task {task_id} cannot start: task {active_task_id} is already active")]
    Conflict {
        /// Task the transition was requested for.
        task_id: TaskId,
        /// Task currently in progress or in review.
        active_task_id: TaskId,
    },

    /// The dependency relation among unfinished tasks contains a cycle.
    #[error("cyclic dependency: {cycle}")]
    CyclicDependency {
        /// The offending cycle.
        cycle: Cycle,
    },

    /// A dependency declaration token is not a well-formed task reference.
    #[error("malformed dependency reference '{raw_token}', expected '#<task number>'")]
    MalformedDependency {
        /// The offending token exactly as written.
        raw_token: String,
    },

    /// A rework request carried no feedback.
    #[error("task {task_id}: rework requires non-empty feedback")]
    MissingFeedback {
        /// Task the rework was requested for.
        task_id: TaskId,
    },

    /// Dependencies cannot change once work has started.
    #[error("task {task_id}: dependencies cannot change while {status}")]
    DependenciesLocked {
        /// Task whose declaration was being changed.
        task_id: TaskId,
        /// Current workflow status.
        status: WorkflowStatus,
    },
}

impl TaskDomainError {
    /// Returns the task the error refers to, when there is a single one.
    #[must_use]
    pub const fn task_id(&self) -> Option<TaskId> {
        match self {
            Self::InvalidTransition { task_id, .. }
            | Self::UnmetDependencies { task_id, .. }
            | Self::Conflict { task_id, .. }
            | Self::MissingFeedback { task_id }
            | Self::DependenciesLocked { task_id, .. } => Some(*task_id),
            Self::InvalidTaskId(_)
            | Self::CyclicDependency { .. }
            | Self::MalformedDependency { .. } => None,
        }
    }

    /// Returns the tasks standing in the way of the requested change.
    #[must_use]
    pub fn blocking_ids(&self) -> Vec<TaskId> {
        match self {
            Self::UnmetDependencies { unmet, .. } => unmet.clone(),
            Self::Conflict { active_task_id, .. } => vec![*active_task_id],
            Self::CyclicDependency { cycle } => cycle.members().to_vec(),
            _ => Vec::new(),
        }
    }
}

fn format_ids(ids: &[TaskId]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Error returned while parsing a workflow status from storage.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown workflow status: {0}")]
pub struct ParseWorkflowStatusError(pub String);

/// Error returned while parsing a native status from storage.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown native status: {0}")]
pub struct ParseNativeStatusError(pub String);
