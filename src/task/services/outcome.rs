//! Requests and results exchanged with callers of the workflow engine.

use super::error::{ErrorKind, WorkflowError};
use crate::task::domain::{NativeStatus, SyncDriftError, Task, TaskId, WorkflowStatus};
use serde::Serialize;

/// A single externally requested workflow operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowCommand {
    /// Move a ready task into progress.
    Start {
        /// Task to start.
        task_id: TaskId,
    },
    /// Hand in-progress work to a reviewer.
    SubmitForReview {
        /// Task under review.
        task_id: TaskId,
        /// Hand-off message for the reviewer.
        message: String,
    },
    /// Accept reviewed work.
    Approve {
        /// Task being approved.
        task_id: TaskId,
        /// Approval summary.
        message: String,
    },
    /// Send reviewed work back with feedback.
    RequestRework {
        /// Task needing changes.
        task_id: TaskId,
        /// What must change.
        feedback: String,
    },
    /// Finish in-progress work without review.
    CompleteDirect {
        /// Task being completed.
        task_id: TaskId,
        /// Completion note.
        message: String,
    },
    /// Move a task to ready regardless of its dependencies.
    ForceReady {
        /// Task to unblock.
        task_id: TaskId,
    },
    /// Move a backlog task to ready or blocked.
    Triage {
        /// Task to triage.
        task_id: TaskId,
    },
    /// Replace a task's dependency declaration.
    DeclareDependencies {
        /// Task whose dependencies change.
        task_id: TaskId,
        /// Free-text declaration such as `#3, #7`.
        declaration: String,
    },
}

impl WorkflowCommand {
    /// Returns the task the command targets.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        match self {
            Self::Start { task_id }
            | Self::SubmitForReview { task_id, .. }
            | Self::Approve { task_id, .. }
            | Self::RequestRework { task_id, .. }
            | Self::CompleteDirect { task_id, .. }
            | Self::ForceReady { task_id }
            | Self::Triage { task_id }
            | Self::DeclareDependencies { task_id, .. } => *task_id,
        }
    }

    /// Returns the operation name used in logs and results.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::SubmitForReview { .. } => "submit_for_review",
            Self::Approve { .. } => "approve",
            Self::RequestRework { .. } => "request_rework",
            Self::CompleteDirect { .. } => "complete_direct",
            Self::ForceReady { .. } => "force_ready",
            Self::Triage { .. } => "triage",
            Self::DeclareDependencies { .. } => "declare_dependencies",
        }
    }
}

/// A dependent that could not be unblocked after a completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropagationFailure {
    /// Dependent left in `blocked`.
    pub task_id: TaskId,
    /// Classification of the failure.
    pub error_kind: ErrorKind,
    /// Human-readable failure message.
    pub detail: String,
}

/// What a successful operation changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionReport {
    /// Task the operation targeted.
    pub task_id: TaskId,
    /// Workflow status before the operation.
    pub previous_status: WorkflowStatus,
    /// Workflow status after the operation.
    pub status: WorkflowStatus,
    /// Native status after the operation, `None` when the field is unset.
    pub native_status: Option<NativeStatus>,
    /// Dependents moved from `blocked` to `ready` by this operation.
    pub unblocked: Vec<TaskId>,
    /// Dependents that should have been unblocked but were not.
    pub propagation_failures: Vec<PropagationFailure>,
    /// Native fields left stale by a failed second write.
    pub drift: Vec<SyncDriftError>,
    /// Non-fatal problems such as annotations that could not be posted.
    pub warnings: Vec<String>,
    /// Whether writes were only simulated.
    pub simulated: bool,
}

impl TransitionReport {
    pub(crate) const fn new(previous: &Task, current: &Task, simulated: bool) -> Self {
        Self {
            task_id: current.id(),
            previous_status: previous.status(),
            status: current.status(),
            native_status: current.native_status(),
            unblocked: Vec::new(),
            propagation_failures: Vec::new(),
            drift: Vec::new(),
            warnings: Vec::new(),
            simulated,
        }
    }
}

/// Result of a reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    /// Number of tasks inspected.
    pub examined: usize,
    /// Drifts whose native field was rewritten.
    pub corrected: Vec<SyncDriftError>,
    /// Drifts that could not be corrected.
    pub failed: Vec<PropagationFailure>,
    /// Whether writes were only simulated.
    pub simulated: bool,
}

/// Uniform structured result returned to CLI and automation callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionOutcome {
    /// Operation that was requested.
    pub operation: &'static str,
    /// Task the operation targeted.
    pub task_id: TaskId,
    /// Whether the operation succeeded.
    pub ok: bool,
    /// Workflow status after the operation, or as last confirmed by the store
    /// on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<WorkflowStatus>,
    /// Native status matching `status`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub native_status: Option<NativeStatus>,
    /// Failure classification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Human-readable failure message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Tasks standing in the way: unmet dependencies, the active task or
    /// cycle members.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blocking_ids: Vec<TaskId>,
    /// Dependents moved to `ready` by the operation.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unblocked: Vec<TaskId>,
    /// Dependents that could not be unblocked.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub propagation_failures: Vec<PropagationFailure>,
    /// Native fields left stale.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub drift: Vec<SyncDriftError>,
    /// Non-fatal problems.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Whether writes were only simulated.
    pub simulated: bool,
}

impl TransitionOutcome {
    /// Builds the result of a successful operation.
    #[must_use]
    pub fn succeeded(operation: &'static str, report: TransitionReport) -> Self {
        Self {
            operation,
            task_id: report.task_id,
            ok: true,
            status: Some(report.status),
            native_status: report.native_status,
            error_kind: None,
            detail: None,
            blocking_ids: Vec::new(),
            unblocked: report.unblocked,
            propagation_failures: report.propagation_failures,
            drift: report.drift,
            warnings: report.warnings,
            simulated: report.simulated,
        }
    }

    /// Builds the result of a failed operation.
    ///
    /// `confirmed` is the task as the store reported it after the failure,
    /// `None` when it could not be read.
    #[must_use]
    pub fn failed(
        operation: &'static str,
        task_id: TaskId,
        error: &WorkflowError,
        confirmed: Option<&Task>,
        simulated: bool,
    ) -> Self {
        Self {
            operation,
            task_id,
            ok: false,
            status: confirmed.map(Task::status),
            native_status: confirmed.and_then(Task::native_status),
            error_kind: Some(error.kind()),
            detail: Some(error.to_string()),
            blocking_ids: error.blocking_ids(),
            unblocked: Vec::new(),
            propagation_failures: Vec::new(),
            drift: Vec::new(),
            warnings: Vec::new(),
            simulated,
        }
    }
}
