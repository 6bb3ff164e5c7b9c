//! Workflow orchestration: validated status transitions against a task store.

use super::{
    annotations::{AnnotationEvent, render_annotation},
    error::{WorkflowError, WorkflowResult},
    outcome::{
        PropagationFailure, ReconciliationReport, TransitionOutcome, TransitionReport,
        WorkflowCommand,
    },
    retry::RetryPolicy,
};
use crate::task::{
    domain::{
        Board, BoardRevision, SyncDriftError, Task, TaskDomainError, TaskId, TransitionContext,
        TransitionTrigger, WorkflowStatus, detect_cycle_from, detect_cycle_with, find_dependents,
        is_ready, parse_dependencies, project, unmet_dependencies, validate_transition,
    },
    ports::{BoardSnapshot, StatusField, TaskStore, TaskStoreError, WriteMode},
};
use mockable::Clock;
use std::sync::Arc;
use tracing::{Instrument, Span, debug, field, info, info_span, warn};
use uuid::Uuid;

/// Orchestrates workflow transitions for tasks held in a [`TaskStore`].
///
/// Every operation re-reads the board, validates against that fresh state
/// and only then writes: first the workflow field, then the native field.
#[derive(Clone)]
pub struct WorkflowService<S, C>
where
    S: TaskStore,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    clock: Arc<C>,
    retry: RetryPolicy,
    mode: WriteMode,
}

impl<S, C> WorkflowService<S, C>
where
    S: TaskStore,
    C: Clock + Send + Sync,
{
    /// Creates a service applying writes with the default retry policy.
    #[must_use]
    pub fn new(store: Arc<S>, clock: Arc<C>) -> Self {
        Self {
            store,
            clock,
            retry: RetryPolicy::default(),
            mode: WriteMode::Apply,
        }
    }

    /// Replaces the retry policy for store calls.
    #[must_use]
    pub const fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Selects whether writes are applied or simulated.
    #[must_use]
    pub const fn with_write_mode(mut self, mode: WriteMode) -> Self {
        self.mode = mode;
        self
    }

    /// Returns the write mode.
    #[must_use]
    pub const fn write_mode(&self) -> WriteMode {
        self.mode
    }

    /// Moves a ready task into progress.
    ///
    /// # Errors
    ///
    /// Returns a conflict when another task is active or the board changed
    /// before the write, unmet dependencies when the task is not ready, and
    /// an invalid transition otherwise.
    pub async fn start(&self, task_id: TaskId) -> WorkflowResult<TransitionReport> {
        self.transition(task_id, TransitionTrigger::Start, None)
            .instrument(self.operation_span("start", Some(task_id)))
            .await
    }

    /// Hands in-progress work to a reviewer.
    ///
    /// # Errors
    ///
    /// Returns an invalid transition unless the task is in progress.
    pub async fn submit_for_review(
        &self,
        task_id: TaskId,
        message: &str,
    ) -> WorkflowResult<TransitionReport> {
        self.transition(task_id, TransitionTrigger::SubmitForReview, Some(message))
            .instrument(self.operation_span("submit_for_review", Some(task_id)))
            .await
    }

    /// Accepts reviewed work and unblocks its dependents.
    ///
    /// # Errors
    ///
    /// Returns an invalid transition unless the task is in review.
    pub async fn approve(&self, task_id: TaskId, message: &str) -> WorkflowResult<TransitionReport> {
        self.transition(task_id, TransitionTrigger::Approve, Some(message))
            .instrument(self.operation_span("approve", Some(task_id)))
            .await
    }

    /// Sends reviewed work back into progress with feedback.
    ///
    /// # Errors
    ///
    /// Returns missing feedback when `feedback` is blank and an invalid
    /// transition unless the task is in review.
    pub async fn request_rework(
        &self,
        task_id: TaskId,
        feedback: &str,
    ) -> WorkflowResult<TransitionReport> {
        self.transition(task_id, TransitionTrigger::Rework, Some(feedback))
            .instrument(self.operation_span("request_rework", Some(task_id)))
            .await
    }

    /// Completes in-progress work without review and unblocks its dependents.
    ///
    /// # Errors
    ///
    /// Returns an invalid transition unless the task is in progress.
    pub async fn complete_direct(
        &self,
        task_id: TaskId,
        message: &str,
    ) -> WorkflowResult<TransitionReport> {
        self.transition(task_id, TransitionTrigger::CompleteDirect, Some(message))
            .instrument(self.operation_span("complete_direct", Some(task_id)))
            .await
    }

    /// Moves a backlog or blocked task to ready without checking
    /// dependencies.
    ///
    /// # Errors
    ///
    /// Returns an invalid transition from any other status.
    pub async fn force_ready(&self, task_id: TaskId) -> WorkflowResult<TransitionReport> {
        self.transition(task_id, TransitionTrigger::ForceReady, None)
            .instrument(self.operation_span("force_ready", Some(task_id)))
            .await
    }

    /// Moves a backlog task to ready, or to blocked when dependencies remain.
    ///
    /// # Errors
    ///
    /// Returns a cyclic dependency when the task's dependencies loop back to
    /// it and an invalid transition unless the task is in the backlog.
    pub async fn triage(&self, task_id: TaskId) -> WorkflowResult<TransitionReport> {
        self.transition(task_id, TransitionTrigger::Triage, None)
            .instrument(self.operation_span("triage", Some(task_id)))
            .await
    }

    /// Replaces the dependency declaration of a task.
    ///
    /// A blocked task whose new dependencies are all done becomes ready.
    ///
    /// # Errors
    ///
    /// Returns a malformed dependency for unparsable declarations, not found
    /// for unknown dependencies, a cyclic dependency when the declaration
    /// would close a loop, unmet dependencies when a ready task would lose
    /// readiness and dependencies locked once work has started.
    pub async fn declare_dependencies(
        &self,
        task_id: TaskId,
        declaration: &str,
    ) -> WorkflowResult<TransitionReport> {
        self.redeclare(task_id, declaration)
            .instrument(self.operation_span("declare_dependencies", Some(task_id)))
            .await
    }

    /// Rewrites the native field of every task whose fields disagree.
    ///
    /// Failures on individual tasks are reported, not returned.
    ///
    /// # Errors
    ///
    /// Returns a store error when the board cannot be read.
    pub async fn reconcile(&self) -> WorkflowResult<ReconciliationReport> {
        self.reconcile_board()
            .instrument(self.operation_span("reconcile", None))
            .await
    }

    /// Runs `command` and folds the result into a [`TransitionOutcome`].
    ///
    /// On failure the task is re-read so the outcome carries the status the
    /// store last confirmed.
    pub async fn execute(&self, command: &WorkflowCommand) -> TransitionOutcome {
        let operation = command.name();
        let task_id = command.task_id();
        let result = match command {
            WorkflowCommand::Start { .. } => self.start(task_id).await,
            WorkflowCommand::SubmitForReview { message, .. } => {
                self.submit_for_review(task_id, message).await
            }
            WorkflowCommand::Approve { message, .. } => self.approve(task_id, message).await,
            WorkflowCommand::RequestRework { feedback, .. } => {
                self.request_rework(task_id, feedback).await
            }
            WorkflowCommand::CompleteDirect { message, .. } => {
                self.complete_direct(task_id, message).await
            }
            WorkflowCommand::ForceReady { .. } => self.force_ready(task_id).await,
            WorkflowCommand::Triage { .. } => self.triage(task_id).await,
            WorkflowCommand::DeclareDependencies { declaration, .. } => {
                self.declare_dependencies(task_id, declaration).await
            }
        };

        match result {
            Ok(report) => TransitionOutcome::succeeded(operation, report),
            Err(err) => {
                let confirmed = self
                    .retry
                    .run("get_task", || self.store.get_task(task_id))
                    .await
                    .ok();
                TransitionOutcome::failed(
                    operation,
                    task_id,
                    &err,
                    confirmed.as_ref(),
                    self.mode.is_simulate(),
                )
            }
        }
    }

    fn operation_span(&self, operation: &'static str, task_id: Option<TaskId>) -> Span {
        let span = info_span!(
            "workflow_operation",
            operation,
            task_id = field::Empty,
            simulate = self.mode.is_simulate(),
            operation_id = %Uuid::new_v4()
        );
        if let Some(id) = task_id {
            span.record("task_id", field::display(id));
        }
        span
    }

    async fn transition(
        &self,
        task_id: TaskId,
        trigger: TransitionTrigger,
        text: Option<&str>,
    ) -> WorkflowResult<TransitionReport> {
        let snapshot = self.read_board(task_id).await?;
        let mut board = snapshot.board;
        let task = board
            .get(task_id)
            .cloned()
            .ok_or(WorkflowError::NotFound(task_id))?;

        if computes_readiness(trigger, task.status())
            && let Some(cycle) = detect_cycle_from(task_id, &board)
        {
            return Err(TaskDomainError::CyclicDependency { cycle }.into());
        }

        let unmet = unmet_dependencies(&task, &board);
        let to = target_status(trigger, unmet.is_empty());
        let mut context = TransitionContext::new(task_id, trigger)
            .with_unmet_dependencies(unmet.clone())
            .with_active_task(board.active_task_other_than(task_id));
        if let (TransitionTrigger::Rework, Some(feedback)) = (trigger, text) {
            context = context.with_feedback(feedback);
        }
        validate_transition(task.status(), to, &context)?;

        if trigger == TransitionTrigger::ForceReady {
            warn!(
                target: "boardflow::override",
                task_id = %task_id,
                from = %task.status(),
                unmet = ?unmet,
                "readiness forced past dependency check"
            );
        }

        let guard = (trigger == TransitionTrigger::Start).then_some(snapshot.revision);
        let mut report = self.write_status(&mut board, &task, to, guard).await?;
        info!(
            task_id = %task_id,
            from = %task.status(),
            to = %to,
            trigger = %trigger,
            "workflow transition applied"
        );

        let event = match trigger {
            TransitionTrigger::Start => AnnotationEvent::Started,
            TransitionTrigger::SubmitForReview => AnnotationEvent::ReviewRequested { message: text },
            TransitionTrigger::Approve => AnnotationEvent::Approved { message: text },
            TransitionTrigger::Rework => AnnotationEvent::ReworkRequested {
                feedback: text.unwrap_or_default(),
            },
            TransitionTrigger::CompleteDirect => AnnotationEvent::Completed { message: text },
            TransitionTrigger::ForceReady => AnnotationEvent::ForcedReady { unmet: &unmet },
            TransitionTrigger::Triage
            | TransitionTrigger::Propagation
            | TransitionTrigger::DependencyChange => AnnotationEvent::Triaged { unmet: &unmet },
        };
        if let Some(current) = board.get(task_id) {
            report.warnings.extend(self.annotate(current, &task, &event).await);
        }

        if to == WorkflowStatus::Done {
            self.propagate_unblocking(task_id, &mut board, &mut report)
                .await;
        }
        Ok(report)
    }

    async fn redeclare(&self, task_id: TaskId, declaration: &str) -> WorkflowResult<TransitionReport> {
        let dependencies = parse_dependencies(declaration)?;
        let snapshot = self.read_board(task_id).await?;
        let mut board = snapshot.board;
        let task = board
            .get(task_id)
            .cloned()
            .ok_or(WorkflowError::NotFound(task_id))?;

        if !matches!(
            task.status(),
            WorkflowStatus::Backlog | WorkflowStatus::Blocked | WorkflowStatus::Ready
        ) {
            return Err(TaskDomainError::DependenciesLocked {
                task_id,
                status: task.status(),
            }
            .into());
        }
        if let Some(missing) = dependencies.iter().find(|id| board.get(*id).is_none()) {
            return Err(WorkflowError::NotFound(missing));
        }
        if let Some(cycle) = detect_cycle_with(task_id, &dependencies, &board) {
            return Err(TaskDomainError::CyclicDependency { cycle }.into());
        }
        let proposed = task.clone().with_dependencies(dependencies.clone());
        let unmet = unmet_dependencies(&proposed, &board);
        if task.status() == WorkflowStatus::Ready && !unmet.is_empty() {
            return Err(TaskDomainError::UnmetDependencies { task_id, unmet }.into());
        }

        self.retry
            .run("set_dependencies", || {
                self.store
                    .set_dependencies(task_id, &dependencies, self.mode)
            })
            .await
            .map_err(|err| WorkflowError::store(task_id, err))?;
        board.upsert(proposed.clone());
        info!(task_id = %task_id, dependencies = %dependencies, "dependencies declared");

        let mut report = TransitionReport::new(&task, &proposed, self.mode.is_simulate());
        report.warnings.extend(
            self.annotate(&proposed, &task, &AnnotationEvent::DependenciesDeclared)
                .await,
        );

        let context = TransitionContext::new(task_id, TransitionTrigger::DependencyChange)
            .with_unmet_dependencies(unmet);
        if proposed.status() == WorkflowStatus::Blocked
            && validate_transition(WorkflowStatus::Blocked, WorkflowStatus::Ready, &context)
                .is_ok()
        {
            match self
                .write_status(&mut board, &proposed, WorkflowStatus::Ready, None)
                .await
            {
                Ok(moved) => {
                    info!(task_id = %task_id, "blocked task ready after dependency change");
                    report.status = moved.status;
                    report.native_status = moved.native_status;
                    report.drift.extend(moved.drift);
                }
                // The new dependencies are already stored, so the declaration
                // stands and the task stays blocked.
                Err(err) => {
                    warn!(
                        task_id = %task_id,
                        error = %err,
                        "task left blocked after dependency change"
                    );
                    report.propagation_failures.push(failure(task_id, &err));
                }
            }
        }
        Ok(report)
    }

    async fn reconcile_board(&self) -> WorkflowResult<ReconciliationReport> {
        let snapshot = self
            .retry
            .run("list_tasks", || self.store.list_tasks())
            .await
            .map_err(|err| WorkflowError::store(None, err))?;
        let mut report = ReconciliationReport {
            examined: snapshot.board.len(),
            simulated: self.mode.is_simulate(),
            ..ReconciliationReport::default()
        };

        for drift in snapshot.board.iter().filter_map(SyncDriftError::for_task) {
            let task_id = drift.task_id;
            let written = self
                .retry
                .run("set_native_field", || {
                    self.store.set_status_field(
                        task_id,
                        StatusField::Native(drift.expected),
                        None,
                        self.mode,
                    )
                })
                .await;
            match written {
                Ok(receipt) => {
                    info!(task_id = %task_id, expected = %drift.expected, ?receipt, "native field reconciled");
                    report.corrected.push(drift);
                }
                Err(source) => {
                    let err = WorkflowError::store(task_id, source);
                    warn!(task_id = %task_id, error = %err, "native field could not be reconciled");
                    report.failed.push(failure(task_id, &err));
                }
            }
        }
        Ok(report)
    }

    /// Unblocks direct dependents of `completed` whose dependencies are now
    /// all done.
    ///
    /// Each dependent is handled independently; failures are recorded on
    /// `report` and never fail the completion itself.
    async fn propagate_unblocking(
        &self,
        completed: TaskId,
        board: &mut Board,
        report: &mut TransitionReport,
    ) {
        for dependent in find_dependents(completed, board) {
            let Some(task) = board.get(dependent).cloned() else {
                continue;
            };
            if task.status() != WorkflowStatus::Blocked {
                continue;
            }
            if let Some(cycle) = detect_cycle_from(dependent, board) {
                let err = WorkflowError::from(TaskDomainError::CyclicDependency { cycle });
                warn!(task_id = %dependent, error = %err, "dependent left blocked");
                report.propagation_failures.push(failure(dependent, &err));
                continue;
            }
            if !is_ready(&task, board) {
                debug!(task_id = %dependent, "dependent still waiting on other dependencies");
                continue;
            }

            match self
                .write_status(board, &task, WorkflowStatus::Ready, None)
                .await
            {
                Ok(unblocked) => {
                    info!(task_id = %dependent, completed = %completed, "dependent unblocked");
                    report.unblocked.push(dependent);
                    report.drift.extend(unblocked.drift);
                    if let Some(current) = board.get(dependent) {
                        let event = AnnotationEvent::Unblocked { completed };
                        report
                            .warnings
                            .extend(self.annotate(current, &task, &event).await);
                    }
                }
                Err(err) => {
                    warn!(task_id = %dependent, error = %err, "dependent could not be unblocked");
                    report.propagation_failures.push(failure(dependent, &err));
                }
            }
        }
    }

    async fn read_board(&self, task_id: TaskId) -> WorkflowResult<BoardSnapshot> {
        self.retry
            .run("list_tasks", || self.store.list_tasks())
            .await
            .map_err(|err| WorkflowError::store(task_id, err))
    }

    /// Writes the workflow field, then the native field, and mirrors the
    /// confirmed result into `board`.
    ///
    /// A failed native write leaves the task drifted and is reported rather
    /// than returned.
    async fn write_status(
        &self,
        board: &mut Board,
        before: &Task,
        to: WorkflowStatus,
        guard: Option<BoardRevision>,
    ) -> WorkflowResult<TransitionReport> {
        let task_id = before.id();
        let workflow_write = self
            .retry
            .run("set_workflow_field", || {
                self.store
                    .set_status_field(task_id, StatusField::Workflow(to), guard, self.mode)
            })
            .await;
        match workflow_write {
            Ok(receipt) => debug!(task_id = %task_id, ?receipt, "workflow field written"),
            Err(TaskStoreError::RevisionConflict { expected, actual }) => {
                debug!(task_id = %task_id, %expected, %actual, "board changed before write");
                return Err(self.conflict_after_race(task_id).await);
            }
            Err(err) => return Err(WorkflowError::store(task_id, err)),
        }

        let mut after = before.clone();
        after.set_workflow_status(to);
        let native = project(to);
        let native_write = self
            .retry
            .run("set_native_field", || {
                self.store
                    .set_status_field(task_id, StatusField::Native(native), None, self.mode)
            })
            .await;
        let mut drift = Vec::new();
        match native_write {
            Ok(receipt) => {
                debug!(task_id = %task_id, ?receipt, "native field written");
                after.set_native_status(native);
            }
            Err(err) => {
                warn!(task_id = %task_id, error = %err, "native field write failed");
                drift.extend(SyncDriftError::for_task(&after));
            }
        }

        let mut report = TransitionReport::new(before, &after, self.mode.is_simulate());
        report.drift = drift;
        board.upsert(after);
        Ok(report)
    }

    async fn conflict_after_race(&self, task_id: TaskId) -> WorkflowError {
        match self.read_board(task_id).await {
            Ok(snapshot) => snapshot.board.active_task_other_than(task_id).map_or(
                WorkflowError::BoardChanged { task_id },
                |active_task_id| {
                    TaskDomainError::Conflict {
                        task_id,
                        active_task_id,
                    }
                    .into()
                },
            ),
            Err(err) => err,
        }
    }

    /// Posts the annotation for `event`, returning a warning on failure.
    async fn annotate(
        &self,
        current: &Task,
        previous: &Task,
        event: &AnnotationEvent<'_>,
    ) -> Option<String> {
        let task_id = current.id();
        let text = match render_annotation(current, previous, event, self.clock.utc()) {
            Ok(text) => text,
            Err(err) => {
                warn!(task_id = %task_id, error = %err, "annotation not rendered");
                return Some(err.to_string());
            }
        };
        let posted = self
            .retry
            .run("post_annotation", || {
                self.store.post_annotation(task_id, &text, self.mode)
            })
            .await;
        posted.err().map(|err| {
            warn!(task_id = %task_id, error = %err, "annotation not posted");
            format!("annotation on {task_id} not posted: {err}")
        })
    }
}

/// A `Ready` task has already passed (or been forced past) its readiness
/// check, so starting it never re-examines dependencies.
const fn computes_readiness(trigger: TransitionTrigger, from: WorkflowStatus) -> bool {
    match trigger {
        TransitionTrigger::Start => !matches!(from, WorkflowStatus::Ready),
        TransitionTrigger::Triage
        | TransitionTrigger::Propagation
        | TransitionTrigger::DependencyChange => true,
        TransitionTrigger::SubmitForReview
        | TransitionTrigger::Approve
        | TransitionTrigger::Rework
        | TransitionTrigger::CompleteDirect
        | TransitionTrigger::ForceReady => false,
    }
}

const fn target_status(trigger: TransitionTrigger, dependencies_met: bool) -> WorkflowStatus {
    match trigger {
        TransitionTrigger::Triage if !dependencies_met => WorkflowStatus::Blocked,
        TransitionTrigger::Triage
        | TransitionTrigger::Propagation
        | TransitionTrigger::DependencyChange
        | TransitionTrigger::ForceReady => WorkflowStatus::Ready,
        TransitionTrigger::Start | TransitionTrigger::Rework => WorkflowStatus::InProgress,
        TransitionTrigger::SubmitForReview => WorkflowStatus::Review,
        TransitionTrigger::CompleteDirect | TransitionTrigger::Approve => WorkflowStatus::Done,
    }
}

fn failure(task_id: TaskId, err: &WorkflowError) -> PropagationFailure {
    PropagationFailure {
        task_id,
        error_kind: err.kind(),
        detail: err.to_string(),
    }
}
