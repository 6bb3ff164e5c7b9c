//! Domain model for the task workflow.
//!
//! Everything in this module is pure: dependency resolution, transition
//! validation and status projection operate on in-memory values and never
//! touch a store.

mod dependency;
mod error;
mod graph;
mod ids;
mod projection;
mod status;
mod task;
mod transition;

pub use dependency::{DependencySet, parse_dependencies};
pub use error::{ParseNativeStatusError, ParseWorkflowStatusError, TaskDomainError};
pub use graph::{
    Board, Cycle, detect_cycle, detect_cycle_from, detect_cycle_with, find_dependents, is_ready,
    unmet_dependencies,
};
pub use ids::{BoardRevision, TaskId};
pub use projection::{StatusPair, SyncDriftError, detect_drift, project};
pub use status::{FieldKind, NativeStatus, WorkflowStatus};
pub use task::{PersistedTaskData, Task, TaskMetadata};
pub use transition::{
    TransitionContext, TransitionTrigger, is_workflow_edge, validate_transition,
};
