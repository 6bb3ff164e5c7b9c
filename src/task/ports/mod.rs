//! Port contracts for the task workflow.
//!
//! Ports define infrastructure-agnostic interfaces used by workflow services.

pub mod store;

pub use store::{
    BoardSnapshot, StatusField, TaskStore, TaskStoreError, TaskStoreResult, WriteMode,
    WriteReceipt,
};

#[cfg(test)]
pub use store::MockTaskStore;
