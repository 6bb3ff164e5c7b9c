//! Task record as seen by the workflow engine.

use super::{DependencySet, NativeStatus, TaskId, WorkflowStatus, project};
use serde::{Deserialize, Serialize};

/// Descriptive task metadata. The engine never interprets it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskMetadata {
    /// Human-readable title.
    pub title: String,
    /// Free-form task type, e.g. `feature` or `bug`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,
    /// Free-form risk classification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub risk_level: Option<String>,
    /// Free-form effort estimate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effort: Option<String>,
}

impl TaskMetadata {
    /// Creates metadata with only a title.
    #[must_use]
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}

/// A unit of work on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    metadata: TaskMetadata,
    dependencies: DependencySet,
    status: WorkflowStatus,
    native_status: Option<NativeStatus>,
}

/// Parameter object for reconstructing a task read from a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskData {
    /// Task identifier.
    pub id: TaskId,
    /// Descriptive metadata.
    pub metadata: TaskMetadata,
    /// Declared dependencies.
    pub dependencies: DependencySet,
    /// Workflow field value.
    pub status: WorkflowStatus,
    /// Native field value, `None` when the field is unset.
    pub native_status: Option<NativeStatus>,
}

impl Task {
    /// Creates a backlog task with no dependencies.
    ///
    /// The native field starts consistent with the workflow field.
    #[must_use]
    pub fn new(id: TaskId, metadata: TaskMetadata) -> Self {
        let status = WorkflowStatus::Backlog;
        Self {
            id,
            metadata,
            dependencies: DependencySet::new(),
            status,
            native_status: Some(project(status)),
        }
    }

    /// Reconstructs a task exactly as a store reported it.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        Self {
            id: data.id,
            metadata: data.metadata,
            dependencies: data.dependencies,
            status: data.status,
            native_status: data.native_status,
        }
    }

    /// Replaces the dependency declaration.
    #[must_use]
    pub fn with_dependencies(mut self, dependencies: DependencySet) -> Self {
        self.dependencies = dependencies;
        self
    }

    /// Sets the workflow status and its projected native status.
    #[must_use]
    pub fn with_status(mut self, status: WorkflowStatus) -> Self {
        self.apply_status(status);
        self
    }

    /// Overrides the native status independently of the workflow status.
    ///
    /// Only stores and tests reproducing field drift should need this.
    #[must_use]
    pub const fn with_native_status(mut self, native_status: Option<NativeStatus>) -> Self {
        self.native_status = native_status;
        self
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the descriptive metadata.
    #[must_use]
    pub const fn metadata(&self) -> &TaskMetadata {
        &self.metadata
    }

    /// Returns the task title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.metadata.title
    }

    /// Returns the declared dependencies.
    #[must_use]
    pub const fn dependencies(&self) -> &DependencySet {
        &self.dependencies
    }

    /// Returns the workflow status.
    #[must_use]
    pub const fn status(&self) -> WorkflowStatus {
        self.status
    }

    /// Returns the native status as last read, `None` when unset.
    #[must_use]
    pub const fn native_status(&self) -> Option<NativeStatus> {
        self.native_status
    }

    pub(crate) fn apply_status(&mut self, status: WorkflowStatus) {
        self.status = status;
        self.native_status = Some(project(status));
    }

    pub(crate) const fn set_workflow_status(&mut self, status: WorkflowStatus) {
        self.status = status;
    }

    pub(crate) fn replace_dependencies(&mut self, dependencies: DependencySet) {
        self.dependencies = dependencies;
    }

    pub(crate) const fn set_native_status(&mut self, native_status: NativeStatus) {
        self.native_status = Some(native_status);
    }
}
