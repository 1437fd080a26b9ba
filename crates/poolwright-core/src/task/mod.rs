//! Tasks: submitted work plus its tracked lifecycle
//!
//! This module provides:
//! - [`Task`] - the shared record a pool, the manager index and a worker all point at
//! - [`TaskStatus`] / [`TaskInfo`] - state and read-only snapshot
//! - [`TaskWork`] / [`TaskContext`] - the body and what it sees while running

mod lifecycle;
mod work;

pub(crate) use lifecycle::Completion;
pub use lifecycle::{Task, TaskInfo, TaskStatus};
pub use work::{TaskContext, TaskWork, WorkResult};
