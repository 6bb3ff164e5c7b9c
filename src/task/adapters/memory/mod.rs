//! In-memory task store for tests and simulations.

mod store;

pub use store::{FaultTarget, InMemoryTaskStore};
