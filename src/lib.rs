//! Boardflow: workflow state machine and dependency resolution for
//! project-board tasks.
//!
//! Tasks move through a six-state workflow (`backlog`, `ready`, `blocked`,
//! `in_progress`, `review`, `done`) subject to dependency readiness and a
//! single-active-task rule. Every workflow change is mirrored onto a
//! three-state native field for tools that only understand the coarse view.
//!
//! # Architecture
//!
//! The [`task`] module follows hexagonal architecture principles:
//!
//! - **Domain**: pure dependency resolution, transition validation and status
//!   projection
//! - **Ports**: the async task store contract
//! - **Adapters**: in-memory and JSON board file stores
//! - **Services**: the workflow orchestrator
//!
//! # Modules
//!
//! - [`task`]: workflow domain, store contract and orchestration
//! - [`config`]: layered configuration
//! - [`telemetry`]: tracing subscriber setup
//! - [`cli`]: command-line front end

pub mod cli;
pub mod config;
pub mod task;
pub mod telemetry;
