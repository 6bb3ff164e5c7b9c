//! Workflow status transition rules.
//!
//! Validation is a pure function of the current status, the requested status
//! and a [`TransitionContext`] assembled by the caller. Nothing here reads
//! from or writes to a store.

use super::{TaskDomainError, TaskId, WorkflowStatus};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The action that requested a transition.
///
/// Several edges are only legal for one explicit action, e.g. `InProgress ->
/// Done` requires [`TransitionTrigger::CompleteDirect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionTrigger {
    /// Moving a backlog task out of the backlog.
    Triage,
    /// Automatic unblocking after a dependency completed.
    Propagation,
    /// Re-evaluation after the task's own declaration changed.
    DependencyChange,
    /// Administrative override ignoring dependency state.
    ForceReady,
    /// Starting work.
    Start,
    /// Submitting work for review.
    SubmitForReview,
    /// Completing work without a review gate.
    CompleteDirect,
    /// Approving reviewed work.
    Approve,
    /// Sending reviewed work back with feedback.
    Rework,
}

impl TransitionTrigger {
    /// Returns the canonical name of the trigger.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Triage => "triage",
            Self::Propagation => "propagation",
            Self::DependencyChange => "dependency_change",
            Self::ForceReady => "force_ready",
            Self::Start => "start",
            Self::SubmitForReview => "submit_for_review",
            Self::CompleteDirect => "complete_direct",
            Self::Approve => "approve",
            Self::Rework => "rework",
        }
    }
}

impl fmt::Display for TransitionTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the validator needs to know beyond the two statuses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionContext {
    task_id: TaskId,
    trigger: TransitionTrigger,
    unmet_dependencies: Vec<TaskId>,
    active_task: Option<TaskId>,
    has_feedback: bool,
}

impl TransitionContext {
    /// Creates a context with no unmet dependencies and no active task.
    #[must_use]
    pub const fn new(task_id: TaskId, trigger: TransitionTrigger) -> Self {
        Self {
            task_id,
            trigger,
            unmet_dependencies: Vec::new(),
            active_task: None,
            has_feedback: false,
        }
    }

    /// Records the task's dependencies that are not done.
    #[must_use]
    pub fn with_unmet_dependencies(mut self, unmet: Vec<TaskId>) -> Self {
        self.unmet_dependencies = unmet;
        self
    }

    /// Records another task currently holding the active slot.
    #[must_use]
    pub const fn with_active_task(mut self, active_task: Option<TaskId>) -> Self {
        self.active_task = active_task;
        self
    }

    /// Records the feedback accompanying a rework request.
    #[must_use]
    pub fn with_feedback(mut self, feedback: &str) -> Self {
        self.has_feedback = !feedback.trim().is_empty();
        self
    }

    /// Returns the task the transition is for.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Returns the requesting action.
    #[must_use]
    pub const fn trigger(&self) -> TransitionTrigger {
        self.trigger
    }

    fn require_ready(&self) -> Result<(), TaskDomainError> {
        if self.unmet_dependencies.is_empty() {
            return Ok(());
        }
        Err(TaskDomainError::UnmetDependencies {
            task_id: self.task_id,
            unmet: self.unmet_dependencies.clone(),
        })
    }

    fn require_free_slot(&self) -> Result<(), TaskDomainError> {
        match self.active_task {
            Some(active_task_id) if active_task_id != self.task_id => {
                Err(TaskDomainError::Conflict {
                    task_id: self.task_id,
                    active_task_id,
                })
            }
            _ => Ok(()),
        }
    }
}

/// Returns whether `from -> to` appears in the workflow at all, for any
/// trigger.
#[must_use]
pub const fn is_workflow_edge(from: WorkflowStatus, to: WorkflowStatus) -> bool {
    use WorkflowStatus::{Backlog, Blocked, Done, InProgress, Ready, Review};
    matches!(
        (from, to),
        (Backlog, Ready | Blocked)
            | (Blocked, Ready)
            | (Ready, InProgress)
            | (InProgress, Review | Done)
            | (Review, Done | InProgress)
    )
}

/// Validates a requested transition.
///
/// # Errors
///
/// Returns [`TaskDomainError::InvalidTransition`] when the edge is not part of
/// the workflow for the context's trigger, and the precondition error of the
/// edge otherwise: [`TaskDomainError::UnmetDependencies`],
/// [`TaskDomainError::Conflict`] or [`TaskDomainError::MissingFeedback`].
pub fn validate_transition(
    from: WorkflowStatus,
    to: WorkflowStatus,
    context: &TransitionContext,
) -> Result<(), TaskDomainError> {
    use TransitionTrigger as T;
    use WorkflowStatus::{Backlog, Blocked, Done, InProgress, Ready, Review};

    match (from, to, context.trigger) {
        (Backlog, Ready, T::Triage) | (Blocked, Ready, T::Propagation | T::DependencyChange) => {
            context.require_ready()
        }
        (Backlog, Blocked, T::Triage) if !context.unmet_dependencies.is_empty() => Ok(()),
        (Backlog | Blocked, Ready, T::ForceReady)
        | (InProgress, Review, T::SubmitForReview)
        | (InProgress, Done, T::CompleteDirect)
        | (Review, Done, T::Approve) => Ok(()),
        // A Ready task may have been forced past its dependencies, so only
        // the active slot is checked here.
        (Ready, InProgress, T::Start) => context.require_free_slot(),
        // Starting a task that is still waiting on dependencies reports the
        // blocking tasks rather than the status mismatch.
        (Backlog | Blocked, InProgress, T::Start) if !context.unmet_dependencies.is_empty() => {
            context.require_ready()
        }
        (Review, InProgress, T::Rework) => {
            if context.has_feedback {
                Ok(())
            } else {
                Err(TaskDomainError::MissingFeedback {
                    task_id: context.task_id,
                })
            }
        }
        _ => Err(TaskDomainError::InvalidTransition {
            task_id: context.task_id,
            from,
            to,
        }),
    }
}
