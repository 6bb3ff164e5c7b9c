//! Application services orchestrating workflow transitions.

mod annotations;
mod error;
mod outcome;
mod retry;
mod workflow;

pub use annotations::{AnnotationError, AnnotationEvent, render_annotation};
pub use error::{ErrorKind, WorkflowError, WorkflowResult};
pub use outcome::{
    PropagationFailure, ReconciliationReport, TransitionOutcome, TransitionReport,
    WorkflowCommand,
};
pub use retry::{RetriesExhausted, RetryPolicy};
pub use workflow::WorkflowService;
