//! JSON board file store.
//!
//! The board file mirrors what a remote project board holds: free-text
//! dependency declarations and human-readable status labels. Labels are
//! translated through a [`StatusLabels`] table built once at startup.

mod labels;
mod store;

pub use labels::{StatusLabelError, StatusLabels, default_native_label, default_workflow_label};
pub use store::{FileStoreError, FileTaskStore};
