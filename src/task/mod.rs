//! Task workflow management for Boardflow.
//!
//! Tasks are validated against the workflow transition table, gated on
//! dependency readiness and the single-active-task rule, and written to the
//! board as a workflow field followed by its projected native field.
//! Completing a task unblocks its direct dependents. The module follows
//! hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]
//! - Orchestration services in [`services`]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
