//! Application Layer
//!
//! Message services and request DTOs. This layer sits between the
//! presentation handlers and the domain repositories, and drives the
//! realtime gateway.

pub mod dto;
pub mod services;
