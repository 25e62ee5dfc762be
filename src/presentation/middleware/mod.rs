//! Middleware
//!
//! Tower middleware for request processing.

pub mod auth;
pub mod cors;

pub use auth::{auth_middleware, decode_identity_token, AuthUser, Claims};
