// HTTP API routes, one module per resource

pub mod common;
pub mod pools;
pub mod stats;
pub mod tasks;

pub use common::{ApiError, ErrorResponse, ListResponse};
