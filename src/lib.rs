//! # ChatPulse Library
//!
//! Real-time messaging backend:
//! - presence tracking across devices and rooms
//! - event fanout for direct and group messages (status, reactions, edits)
//! - peer-to-peer call signaling relay
//! - REST endpoints over the durable message store
//!
//! ## Architecture
//!
//! - **Domain Layer**: messages, groups, reactions and repository traits
//! - **Application Layer**: message services and request DTOs
//! - **Realtime Layer**: identity registry, membership, gateway, call relay
//! - **Infrastructure Layer**: PostgreSQL and in-memory stores, metrics
//! - **Presentation Layer**: HTTP handlers and the WebSocket connection handler
//!
//! ## Module Structure
//!
//! ```text
//! chatpulse/
//! +-- config/         Configuration management
//! +-- domain/         Entities, identifiers and repository traits
//! +-- application/    Message services and DTOs
//! +-- realtime/       Presence and fanout core
//! +-- infrastructure/ Stores, migrations and metrics
//! +-- presentation/   HTTP routes and WebSocket handlers
//! +-- shared/         Errors and validation helpers
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Business services
pub mod application;

// Realtime layer - presence and fanout
pub mod realtime;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP and WebSocket handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
