//! Human-readable audit annotations posted alongside status changes.

use crate::task::domain::{Task, TaskId};
use chrono::{DateTime, Utc};
use minijinja::Environment;
use serde_json::{Map, Value};
use thiserror::Error;

const START_TEMPLATE: &str = "Work started on {{ task }} ({{ title }}) at {{ at }}.";

const REVIEW_REQUEST_TEMPLATE: &str = "\
Review requested for {{ task }} ({{ title }}) at {{ at }}.
{% if message %}
{{ message }}
{% endif %}
Reviewer guidance:
- approve: boardflow approve {{ id }} --message \"<summary>\"
- request changes: boardflow rework {{ id }} --feedback \"<what to change>\"
<!-- boardflow:review-request task={{ id }} -->";

const APPROVAL_TEMPLATE: &str = "\
Approved {{ task }} at {{ at }}; task is done.\
{% if message %}
{{ message }}{% endif %}";

const REWORK_TEMPLATE: &str = "\
Changes requested on {{ task }} at {{ at }}; task is back in progress.
Feedback:
{{ feedback }}";

const COMPLETION_TEMPLATE: &str = "\
Completed {{ task }} at {{ at }} without review.\
{% if message %}
{{ message }}{% endif %}";

const FORCE_READY_TEMPLATE: &str = "\
Readiness override on {{ task }} at {{ at }}: moved from {{ from }} to ready.\
{% if unmet %} Unmet dependencies at the time: {{ unmet | join(\", \") }}.{% endif %}";

const TRIAGE_TEMPLATE: &str = "\
Triaged {{ task }} at {{ at }}: {{ to }}.\
{% if unmet %} Waiting on {{ unmet | join(\", \") }}.{% endif %}";

const UNBLOCKED_TEMPLATE: &str = "\
Unblocked {{ task }} at {{ at }}: dependency {{ completed }} is done.";

const DEPENDENCIES_TEMPLATE: &str = "\
Dependencies of {{ task }} declared at {{ at }}: {{ dependencies }}.";

/// Raised when an annotation template fails to render.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("annotation '{kind}' failed to render: {reason}")]
pub struct AnnotationError {
    /// Annotation kind being rendered.
    pub kind: &'static str,
    /// Rendering failure message.
    pub reason: String,
}

/// Event an annotation describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnnotationEvent<'a> {
    /// Work started.
    Started,
    /// Work handed to a reviewer.
    ReviewRequested {
        /// Optional hand-off message.
        message: Option<&'a str>,
    },
    /// Reviewer approved the work.
    Approved {
        /// Optional approval summary.
        message: Option<&'a str>,
    },
    /// Reviewer requested changes.
    ReworkRequested {
        /// Required feedback.
        feedback: &'a str,
    },
    /// Work finished without review.
    Completed {
        /// Optional completion note.
        message: Option<&'a str>,
    },
    /// Readiness was forced past its dependency check.
    ForcedReady {
        /// Unmet dependencies bypassed by the override.
        unmet: &'a [TaskId],
    },
    /// Task was triaged out of the backlog.
    Triaged {
        /// Unmet dependencies, empty when the task became ready.
        unmet: &'a [TaskId],
    },
    /// Task left `blocked` because a dependency completed.
    Unblocked {
        /// The dependency whose completion unblocked the task.
        completed: TaskId,
    },
    /// Dependency list was replaced.
    DependenciesDeclared,
}

impl AnnotationEvent<'_> {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Started => "start",
            Self::ReviewRequested { .. } => "review_request",
            Self::Approved { .. } => "approval",
            Self::ReworkRequested { .. } => "rework",
            Self::Completed { .. } => "completion",
            Self::ForcedReady { .. } => "force_ready",
            Self::Triaged { .. } => "triage",
            Self::Unblocked { .. } => "unblocked",
            Self::DependenciesDeclared => "dependencies",
        }
    }

    const fn template(&self) -> &'static str {
        match self {
            Self::Started => START_TEMPLATE,
            Self::ReviewRequested { .. } => REVIEW_REQUEST_TEMPLATE,
            Self::Approved { .. } => APPROVAL_TEMPLATE,
            Self::ReworkRequested { .. } => REWORK_TEMPLATE,
            Self::Completed { .. } => COMPLETION_TEMPLATE,
            Self::ForcedReady { .. } => FORCE_READY_TEMPLATE,
            Self::Triaged { .. } => TRIAGE_TEMPLATE,
            Self::Unblocked { .. } => UNBLOCKED_TEMPLATE,
            Self::DependenciesDeclared => DEPENDENCIES_TEMPLATE,
        }
    }
}

/// Renders the annotation for `event` on `task`.
///
/// `task` is the task as it looks after the change.
///
/// # Errors
///
/// Returns [`AnnotationError`] when the template fails to render.
pub fn render_annotation(
    task: &Task,
    previous: &Task,
    event: &AnnotationEvent<'_>,
    at: DateTime<Utc>,
) -> Result<String, AnnotationError> {
    let environment = Environment::new();
    let context = build_context(task, previous, event, at);
    environment
        .render_str(event.template(), context)
        .map(|text| text.trim().to_owned())
        .map_err(|error| AnnotationError {
            kind: event.kind(),
            reason: error.to_string(),
        })
}

fn build_context(
    task: &Task,
    previous: &Task,
    event: &AnnotationEvent<'_>,
    at: DateTime<Utc>,
) -> Map<String, Value> {
    let mut context = Map::new();
    context.insert("id".to_owned(), Value::from(task.id().value()));
    context.insert("task".to_owned(), Value::String(task.id().to_string()));
    context.insert("title".to_owned(), Value::String(task.title().to_owned()));
    context.insert("at".to_owned(), Value::String(at.to_rfc3339()));
    context.insert(
        "from".to_owned(),
        Value::String(previous.status().to_string()),
    );
    context.insert("to".to_owned(), Value::String(task.status().to_string()));
    context.insert(
        "dependencies".to_owned(),
        Value::String(task.dependencies().to_string()),
    );

    match event {
        AnnotationEvent::ReviewRequested { message }
        | AnnotationEvent::Approved { message }
        | AnnotationEvent::Completed { message } => {
            insert_text(&mut context, "message", *message);
        }
        AnnotationEvent::ReworkRequested { feedback } => {
            insert_text(&mut context, "feedback", Some(feedback));
        }
        AnnotationEvent::ForcedReady { unmet } | AnnotationEvent::Triaged { unmet } => {
            context.insert(
                "unmet".to_owned(),
                Value::Array(
                    unmet
                        .iter()
                        .map(|id| Value::String(id.to_string()))
                        .collect(),
                ),
            );
        }
        AnnotationEvent::Unblocked { completed } => {
            context.insert(
                "completed".to_owned(),
                Value::String(completed.to_string()),
            );
        }
        AnnotationEvent::Started | AnnotationEvent::DependenciesDeclared => {}
    }
    context
}

fn insert_text(context: &mut Map<String, Value>, key: &str, text: Option<&str>) {
    if let Some(value) = text.map(str::trim).filter(|value| !value.is_empty()) {
        context.insert(key.to_owned(), Value::String(value.to_owned()));
    }
}
