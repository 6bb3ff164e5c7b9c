//! Enum-keyed table of status field labels.

use crate::task::domain::{FieldKind, NativeStatus, WorkflowStatus};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Errors raised while building or consulting a [`StatusLabels`] table.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StatusLabelError {
    /// A status has no label.
    #[error("no {kind} label configured for status '{status}'")]
    MissingLabel {
        /// Field the label belongs to.
        kind: FieldKind,
        /// Status without a label.
        status: String,
    },

    /// Two statuses share a label.
    #[error("{kind} label '{label}' is used for more than one status")]
    DuplicateLabel {
        /// Field the label belongs to.
        kind: FieldKind,
        /// The shared label.
        label: String,
    },

    /// A stored label matches no status.
    #[error("unknown {kind} label '{label}'")]
    UnknownLabel {
        /// Field the label was read from.
        kind: FieldKind,
        /// The unrecognised label.
        label: String,
    },
}

/// Bidirectional mapping between status values and the labels a board uses.
///
/// Label lookups ignore case and surrounding whitespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLabels {
    workflow: BTreeMap<WorkflowStatus, String>,
    native: BTreeMap<NativeStatus, String>,
    workflow_by_label: HashMap<String, WorkflowStatus>,
    native_by_label: HashMap<String, NativeStatus>,
}

impl StatusLabels {
    /// Builds a table, requiring a unique label for every status.
    ///
    /// # Errors
    ///
    /// Returns [`StatusLabelError::MissingLabel`] when a status has no label
    /// and [`StatusLabelError::DuplicateLabel`] when a label is reused within
    /// one field.
    pub fn new(
        workflow: BTreeMap<WorkflowStatus, String>,
        native: BTreeMap<NativeStatus, String>,
    ) -> Result<Self, StatusLabelError> {
        let workflow_by_label = invert(FieldKind::Workflow, &WorkflowStatus::ALL, &workflow)?;
        let native_by_label = invert(FieldKind::Native, &NativeStatus::ALL, &native)?;
        Ok(Self {
            workflow,
            native,
            workflow_by_label,
            native_by_label,
        })
    }

    /// Returns the label of a workflow status.
    #[must_use]
    pub fn workflow_label(&self, status: WorkflowStatus) -> &str {
        self.workflow
            .get(&status)
            .map_or_else(|| status.as_str(), String::as_str)
    }

    /// Returns the label of a native status.
    #[must_use]
    pub fn native_label(&self, status: NativeStatus) -> &str {
        self.native
            .get(&status)
            .map_or_else(|| status.as_str(), String::as_str)
    }

    /// Resolves a stored workflow label.
    ///
    /// # Errors
    ///
    /// Returns [`StatusLabelError::UnknownLabel`] when no status uses it.
    pub fn workflow_status(&self, label: &str) -> Result<WorkflowStatus, StatusLabelError> {
        self.workflow_by_label
            .get(&normalize(label))
            .copied()
            .ok_or_else(|| StatusLabelError::UnknownLabel {
                kind: FieldKind::Workflow,
                label: label.to_owned(),
            })
    }

    /// Resolves a stored native label.
    ///
    /// # Errors
    ///
    /// Returns [`StatusLabelError::UnknownLabel`] when no status uses it.
    pub fn native_status(&self, label: &str) -> Result<NativeStatus, StatusLabelError> {
        self.native_by_label
            .get(&normalize(label))
            .copied()
            .ok_or_else(|| StatusLabelError::UnknownLabel {
                kind: FieldKind::Native,
                label: label.to_owned(),
            })
    }
}

impl Default for StatusLabels {
    fn default() -> Self {
        let workflow = WorkflowStatus::ALL
            .into_iter()
            .map(|status| (status, default_workflow_label(status).to_owned()))
            .collect();
        let native = NativeStatus::ALL
            .into_iter()
            .map(|status| (status, default_native_label(status).to_owned()))
            .collect();
        let workflow_by_label = WorkflowStatus::ALL
            .into_iter()
            .map(|status| (normalize(default_workflow_label(status)), status))
            .collect();
        let native_by_label = NativeStatus::ALL
            .into_iter()
            .map(|status| (normalize(default_native_label(status)), status))
            .collect();
        Self {
            workflow,
            native,
            workflow_by_label,
            native_by_label,
        }
    }
}

/// Label a board uses for a workflow status unless configured otherwise.
#[must_use]
pub const fn default_workflow_label(status: WorkflowStatus) -> &'static str {
    match status {
        WorkflowStatus::Backlog => "Backlog",
        WorkflowStatus::Ready => "Ready",
        WorkflowStatus::Blocked => "Blocked",
        WorkflowStatus::InProgress => "In Progress",
        WorkflowStatus::Review => "Review",
        WorkflowStatus::Done => "Done",
    }
}

/// Label a board uses for a native status unless configured otherwise.
#[must_use]
pub const fn default_native_label(status: NativeStatus) -> &'static str {
    match status {
        NativeStatus::Todo => "Todo",
        NativeStatus::InProgress => "In Progress",
        NativeStatus::Done => "Done",
    }
}

fn normalize(label: &str) -> String {
    label.trim().to_lowercase()
}

fn invert<S>(
    kind: FieldKind,
    all: &[S],
    labels: &BTreeMap<S, String>,
) -> Result<HashMap<String, S>, StatusLabelError>
where
    S: Copy + Ord + std::fmt::Display,
{
    let mut inverted = HashMap::with_capacity(all.len());
    for status in all {
        let label = labels
            .get(status)
            .filter(|label| !label.trim().is_empty())
            .ok_or_else(|| StatusLabelError::MissingLabel {
                kind,
                status: status.to_string(),
            })?;
        if inverted.insert(normalize(label), *status).is_some() {
            return Err(StatusLabelError::DuplicateLabel {
                kind,
                label: label.clone(),
            });
        }
    }
    Ok(inverted)
}
