//! HTTP Layer
//!
//! REST front for the durable store collaborators plus health and metrics.

pub mod handlers;
pub mod routes;

pub use routes::create_router;
