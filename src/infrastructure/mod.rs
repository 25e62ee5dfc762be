//! Infrastructure Layer
//!
//! Implementations for external collaborators:
//! - Durable store repositories (PostgreSQL and in-memory)
//! - Database pool and migrations
//! - Prometheus metrics

pub mod database;
pub mod metrics;
pub mod repositories;
