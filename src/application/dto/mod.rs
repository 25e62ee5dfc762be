//! Data Transfer Objects
//!
//! Request bodies accepted by the HTTP API. Responses are the domain
//! records themselves.

pub mod request;

pub use request::*;
