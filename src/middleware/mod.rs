//! Middleware for the PrestAmigo API

mod tracing;

pub use tracing::request_tracing;
