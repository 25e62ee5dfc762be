//! # Domain Layer
//!
//! Core business types of the messaging backend, independent of the
//! transport and storage layers.
//!
//! ## Structure
//!
//! - **entities**: messages, groups, reactions and their repository traits
//! - **value_objects**: identifiers

pub mod entities;
pub mod value_objects;

// Re-export commonly used types
pub use entities::*;
pub use value_objects::*;
