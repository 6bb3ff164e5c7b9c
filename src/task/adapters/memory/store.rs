//! Thread-safe in-memory board.

use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, RwLock};

use crate::task::{
    domain::{Board, BoardRevision, DependencySet, Task, TaskId, WorkflowStatus},
    ports::{
        BoardSnapshot, StatusField, TaskStore, TaskStoreError, TaskStoreResult, WriteMode,
        WriteReceipt,
    },
};

/// Store call that an injected fault applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultTarget {
    /// `get_task` and `list_tasks`.
    Read,
    /// Writes to the workflow status field.
    WorkflowField,
    /// Writes to the native status field.
    NativeField,
    /// Dependency declaration writes.
    Dependencies,
    /// Annotation posts.
    Annotation,
}

#[derive(Debug, Clone, Copy)]
struct Fault {
    target: FaultTarget,
    task: Option<TaskId>,
    remaining: u32,
    transient: bool,
}

/// Thread-safe in-memory task store.
///
/// Besides the store contract it supports injecting transient or fatal
/// failures and interleaving a concurrent status change before the next
/// status write, which is how tests reproduce partial writes and races.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskStore {
    state: Arc<RwLock<InMemoryBoardState>>,
}

#[derive(Debug, Default)]
struct InMemoryBoardState {
    tasks: BTreeMap<TaskId, Task>,
    revision: BoardRevision,
    annotations: BTreeMap<TaskId, Vec<String>>,
    faults: Vec<Fault>,
    interleaved: VecDeque<(TaskId, WorkflowStatus)>,
}

impl InMemoryBoardState {
    fn take_fault(&mut self, target: FaultTarget, id: Option<TaskId>) -> Option<TaskStoreError> {
        let fault = self.faults.iter_mut().find(|fault| {
            fault.target == target
                && fault.remaining > 0
                && fault.task.is_none_or(|task| Some(task) == id)
        })?;
        fault.remaining -= 1;
        let error = std::io::Error::other(format!("injected {target:?} failure"));
        Some(if fault.transient {
            TaskStoreError::transient(error)
        } else {
            TaskStoreError::fatal(error)
        })
    }

    fn task_mut(&mut self, id: TaskId) -> TaskStoreResult<&mut Task> {
        self.tasks.get_mut(&id).ok_or(TaskStoreError::NotFound(id))
    }

    fn ensure_exists(&self, id: TaskId) -> TaskStoreResult<()> {
        if self.tasks.contains_key(&id) {
            Ok(())
        } else {
            Err(TaskStoreError::NotFound(id))
        }
    }

    fn apply_interleaved(&mut self) {
        while let Some((id, status)) = self.interleaved.pop_front() {
            if let Some(task) = self.tasks.get_mut(&id) {
                task.apply_status(status);
                self.revision = self.revision.next();
            }
        }
    }

    fn advance(&mut self) -> WriteReceipt {
        self.revision = self.revision.next();
        WriteReceipt::Applied {
            revision: self.revision,
        }
    }
}

fn lock_error(err: impl ToString) -> TaskStoreError {
    TaskStoreError::fatal(std::io::Error::other(err.to_string()))
}

impl InMemoryTaskStore {
    /// Creates an empty board.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a board holding `tasks`.
    #[must_use]
    pub fn with_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let store = Self::new();
        if let Ok(mut state) = store.state.write() {
            state.tasks = tasks.into_iter().map(|task| (task.id(), task)).collect();
        }
        store
    }

    /// Adds or replaces a task without advancing the revision.
    pub fn seed(&self, task: Task) {
        if let Ok(mut state) = self.state.write() {
            state.tasks.insert(task.id(), task);
        }
    }

    /// Returns the current copy of a task.
    #[must_use]
    pub fn task(&self, id: TaskId) -> Option<Task> {
        self.state
            .read()
            .ok()
            .and_then(|state| state.tasks.get(&id).cloned())
    }

    /// Returns the annotations posted on a task, oldest first.
    #[must_use]
    pub fn annotations(&self, id: TaskId) -> Vec<String> {
        self.state
            .read()
            .ok()
            .and_then(|state| state.annotations.get(&id).cloned())
            .unwrap_or_default()
    }

    /// Returns the current board revision.
    #[must_use]
    pub fn revision(&self) -> BoardRevision {
        self.state
            .read()
            .map(|state| state.revision)
            .unwrap_or_default()
    }

    /// Makes the next `count` calls to `target` fail transiently.
    pub fn fail_transiently(&self, target: FaultTarget, count: u32) {
        self.push_fault(Fault {
            target,
            task: None,
            remaining: count,
            transient: true,
        });
    }

    /// Makes every later call to `target` fail permanently.
    pub fn fail_permanently(&self, target: FaultTarget) {
        self.push_fault(Fault {
            target,
            task: None,
            remaining: u32::MAX,
            transient: false,
        });
    }

    /// Makes every later call to `target` for task `id` fail permanently.
    pub fn fail_permanently_for(&self, target: FaultTarget, id: TaskId) {
        self.push_fault(Fault {
            target,
            task: Some(id),
            remaining: u32::MAX,
            transient: false,
        });
    }

    /// Applies `status` to task `id` just before the next status write, as
    /// if another invocation had written it in between.
    pub fn interleave_status_change(&self, id: TaskId, status: WorkflowStatus) {
        if let Ok(mut state) = self.state.write() {
            state.interleaved.push_back((id, status));
        }
    }

    fn push_fault(&self, fault: Fault) {
        if let Ok(mut state) = self.state.write() {
            state.faults.push(fault);
        }
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn get_task(&self, id: TaskId) -> TaskStoreResult<Task> {
        let mut state = self.state.write().map_err(lock_error)?;
        if let Some(err) = state.take_fault(FaultTarget::Read, Some(id)) {
            return Err(err);
        }
        state
            .tasks
            .get(&id)
            .cloned()
            .ok_or(TaskStoreError::NotFound(id))
    }

    async fn list_tasks(&self) -> TaskStoreResult<BoardSnapshot> {
        let mut state = self.state.write().map_err(lock_error)?;
        if let Some(err) = state.take_fault(FaultTarget::Read, None) {
            return Err(err);
        }
        Ok(BoardSnapshot {
            board: state.tasks.values().cloned().collect::<Board>(),
            revision: state.revision,
        })
    }

    async fn set_status_field(
        &self,
        id: TaskId,
        field: StatusField,
        guard: Option<BoardRevision>,
        mode: WriteMode,
    ) -> TaskStoreResult<WriteReceipt> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.ensure_exists(id)?;
        state.apply_interleaved();
        let target = match field {
            StatusField::Workflow(_) => FaultTarget::WorkflowField,
            StatusField::Native(_) => FaultTarget::NativeField,
        };
        if let Some(err) = state.take_fault(target, Some(id)) {
            return Err(err);
        }
        if let Some(expected) = guard.filter(|expected| *expected != state.revision) {
            return Err(TaskStoreError::RevisionConflict {
                expected,
                actual: state.revision,
            });
        }
        if mode.is_simulate() {
            return Ok(WriteReceipt::Simulated {
                description: format!("would set {field} on task {id}"),
            });
        }

        let task = state.task_mut(id)?;
        match field {
            // The native field keeps whatever it held until it is written
            // separately.
            StatusField::Workflow(status) => task.set_workflow_status(status),
            StatusField::Native(native) => task.set_native_status(native),
        }
        Ok(state.advance())
    }

    async fn set_dependencies(
        &self,
        id: TaskId,
        dependencies: &DependencySet,
        mode: WriteMode,
    ) -> TaskStoreResult<WriteReceipt> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.ensure_exists(id)?;
        if let Some(err) = state.take_fault(FaultTarget::Dependencies, Some(id)) {
            return Err(err);
        }
        if mode.is_simulate() {
            return Ok(WriteReceipt::Simulated {
                description: format!("would declare dependencies {dependencies} on task {id}"),
            });
        }
        state.task_mut(id)?.replace_dependencies(dependencies.clone());
        Ok(state.advance())
    }

    async fn post_annotation(
        &self,
        id: TaskId,
        text: &str,
        mode: WriteMode,
    ) -> TaskStoreResult<WriteReceipt> {
        let mut state = self.state.write().map_err(lock_error)?;
        state.ensure_exists(id)?;
        if let Some(err) = state.take_fault(FaultTarget::Annotation, Some(id)) {
            return Err(err);
        }
        if mode.is_simulate() {
            return Ok(WriteReceipt::Simulated {
                description: format!("would annotate task {id}: {text}"),
            });
        }
        state
            .annotations
            .entry(id)
            .or_default()
            .push(text.to_owned());
        Ok(WriteReceipt::Applied {
            revision: state.revision,
        })
    }
}
