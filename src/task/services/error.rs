//! Errors surfaced by workflow operations.

use crate::task::{
    domain::{TaskDomainError, TaskId},
    ports::TaskStoreError,
};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Caller-facing classification of a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The task does not exist.
    NotFound,
    /// The requested edge is not in the transition table.
    InvalidTransition,
    /// Some dependencies are not done.
    UnmetDependency,
    /// Another task is active or the board changed under the operation.
    Conflict,
    /// The dependency graph contains a cycle.
    CyclicDependency,
    /// A dependency declaration could not be parsed.
    MalformedDependency,
    /// Rework was requested without feedback.
    MissingFeedback,
    /// Dependencies cannot change in the task's current status.
    DependenciesLocked,
    /// The store failed temporarily.
    TransientStore,
    /// The store failed permanently or retries ran out.
    FatalStore,
}

impl ErrorKind {
    /// Returns the canonical snake-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidTransition => "invalid_transition",
            Self::UnmetDependency => "unmet_dependency",
            Self::Conflict => "conflict",
            Self::CyclicDependency => "cyclic_dependency",
            Self::MalformedDependency => "malformed_dependency",
            Self::MissingFeedback => "missing_feedback",
            Self::DependenciesLocked => "dependencies_locked",
            Self::TransientStore => "transient_store",
            Self::FatalStore => "fatal_store",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Service-level errors for workflow operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Validation rejected the operation before any write.
    #[error(transparent)]
    Domain(#[from] TaskDomainError),

    /// A task named by the operation does not exist.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// The board changed between the readiness check and the write.
    #[error("board changed while starting {task_id}; retry after re-reading the board")]
    BoardChanged {
        /// Task being started.
        task_id: TaskId,
    },

    /// The store failed.
    #[error("store failure: {source}")]
    Store {
        /// Task the failing call was for, if any.
        task_id: Option<TaskId>,
        /// Underlying store error.
        source: TaskStoreError,
    },
}

/// Result type for workflow operations.
pub type WorkflowResult<T> = Result<T, WorkflowError>;

impl WorkflowError {
    pub(crate) fn store(task_id: impl Into<Option<TaskId>>, source: TaskStoreError) -> Self {
        match source {
            TaskStoreError::NotFound(missing) => Self::NotFound(missing),
            other => Self::Store {
                task_id: task_id.into(),
                source: other,
            },
        }
    }

    /// Classifies the error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Domain(err) => match err {
                TaskDomainError::InvalidTaskId(_) => ErrorKind::NotFound,
                TaskDomainError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
                TaskDomainError::UnmetDependencies { .. } => ErrorKind::UnmetDependency,
                TaskDomainError::Conflict { .. } => ErrorKind::Conflict,
                TaskDomainError::CyclicDependency { .. } => ErrorKind::CyclicDependency,
                TaskDomainError::MalformedDependency { .. } => ErrorKind::MalformedDependency,
                TaskDomainError::MissingFeedback { .. } => ErrorKind::MissingFeedback,
                TaskDomainError::DependenciesLocked { .. } => ErrorKind::DependenciesLocked,
            },
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::BoardChanged { .. } => ErrorKind::Conflict,
            Self::Store { source, .. } => match source {
                TaskStoreError::Transient(_) => ErrorKind::TransientStore,
                TaskStoreError::RevisionConflict { .. } => ErrorKind::Conflict,
                TaskStoreError::NotFound(_) | TaskStoreError::Fatal(_) => ErrorKind::FatalStore,
            },
        }
    }

    /// Returns whether repeating the operation may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::TransientStore)
    }

    /// Returns the task the error concerns, when known.
    #[must_use]
    pub const fn task_id(&self) -> Option<TaskId> {
        match self {
            Self::Domain(err) => err.task_id(),
            Self::NotFound(id) | Self::BoardChanged { task_id: id } => Some(*id),
            Self::Store { task_id, .. } => *task_id,
        }
    }

    /// Returns the task identifiers that block the operation.
    #[must_use]
    pub fn blocking_ids(&self) -> Vec<TaskId> {
        match self {
            Self::Domain(err) => err.blocking_ids(),
            _ => Vec::new(),
        }
    }
}
