//! Task store port: reading tasks and writing status fields on the board.

use crate::task::domain::{
    Board, BoardRevision, DependencySet, FieldKind, NativeStatus, Task, TaskId, WorkflowStatus,
};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Result type for task store operations.
pub type TaskStoreResult<T> = Result<T, TaskStoreError>;

/// Whether a write is applied or only described.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum WriteMode {
    /// Perform the write.
    #[default]
    Apply,
    /// Turn the write into a no-op that reports what would have happened.
    Simulate,
}

impl WriteMode {
    /// Selects the mode from a dry-run flag.
    #[must_use]
    pub const fn from_simulate(simulate: bool) -> Self {
        if simulate { Self::Simulate } else { Self::Apply }
    }

    /// Returns whether writes are simulated.
    #[must_use]
    pub const fn is_simulate(self) -> bool {
        matches!(self, Self::Simulate)
    }
}

/// What a store did with a write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteReceipt {
    /// The write was applied and the board advanced to `revision`.
    Applied {
        /// Board revision after the write.
        revision: BoardRevision,
    },
    /// Nothing was written.
    Simulated {
        /// Description of the write that would have been performed.
        description: String,
    },
}

impl WriteReceipt {
    /// Returns whether the write was applied.
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// A value for one of the two status fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusField {
    /// Value for the workflow field.
    Workflow(WorkflowStatus),
    /// Value for the native compatibility field.
    Native(NativeStatus),
}

impl StatusField {
    /// Returns which field the value belongs to.
    #[must_use]
    pub const fn kind(self) -> FieldKind {
        match self {
            Self::Workflow(_) => FieldKind::Workflow,
            Self::Native(_) => FieldKind::Native,
        }
    }
}

impl fmt::Display for StatusField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Workflow(status) => write!(f, "workflow={status}"),
            Self::Native(status) => write!(f, "native={status}"),
        }
    }
}

/// All tasks on the board together with the revision they were read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardSnapshot {
    /// Every task on the board.
    pub board: Board,
    /// Revision the board was read at.
    pub revision: BoardRevision,
}

/// Contract of the external store holding the board.
///
/// Reads always hit the store. Writes honour [`WriteMode`]: in
/// [`WriteMode::Simulate`] they return [`WriteReceipt::Simulated`] and leave
/// the board untouched.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Reads one task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::NotFound`] when no task has the identifier.
    async fn get_task(&self, id: TaskId) -> TaskStoreResult<Task>;

    /// Reads every task on the board.
    async fn list_tasks(&self) -> TaskStoreResult<BoardSnapshot>;

    /// Writes one status field of a task.
    ///
    /// When `guard` is set the write is rejected with
    /// [`TaskStoreError::RevisionConflict`] unless the board is still at that
    /// revision.
    ///
    /// # Errors
    ///
    /// Returns [`TaskStoreError::NotFound`] for unknown tasks, and transient
    /// or fatal errors when the store cannot be reached.
    async fn set_status_field(
        &self,
        id: TaskId,
        field: StatusField,
        guard: Option<BoardRevision>,
        mode: WriteMode,
    ) -> TaskStoreResult<WriteReceipt>;

    /// Replaces the dependency declaration of a task.
    async fn set_dependencies(
        &self,
        id: TaskId,
        dependencies: &DependencySet,
        mode: WriteMode,
    ) -> TaskStoreResult<WriteReceipt>;

    /// Posts a free-text annotation on a task.
    async fn post_annotation(
        &self,
        id: TaskId,
        text: &str,
        mode: WriteMode,
    ) -> TaskStoreResult<WriteReceipt>;
}

/// Errors returned by task store implementations.
#[derive(Debug, Clone, Error)]
pub enum TaskStoreError {
    /// The task does not exist.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// A guarded write observed a board that changed since it was read.
    #[error("board changed since it was read (expected {expected}, found {actual})")]
    RevisionConflict {
        /// Revision the caller read.
        expected: BoardRevision,
        /// Revision the store is at.
        actual: BoardRevision,
    },

    /// Temporary failure; the call may succeed if repeated.
    #[error("transient store error: {0}")]
    Transient(Arc<dyn std::error::Error + Send + Sync>),

    /// Permanent failure; repeating the call will not help.
    #[error("fatal store error: {0}")]
    Fatal(Arc<dyn std::error::Error + Send + Sync>),
}

impl TaskStoreError {
    /// Wraps a temporary failure.
    pub fn transient(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Transient(Arc::new(err))
    }

    /// Wraps a permanent failure.
    pub fn fatal(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Fatal(Arc::new(err))
    }

    /// Returns whether the call may be repeated.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
