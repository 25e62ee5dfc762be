//! # Domain Value Objects
//!
//! Immutable value types that represent domain concepts without identity.
//!
//! ## Value Objects
//!
//! - **UserId / RoomId**: opaque identities supplied by external services
//! - **ConnectionId**: one live transport session
//! - **MessageId**: time-ordered message identifier

mod ids;

pub use ids::*;
