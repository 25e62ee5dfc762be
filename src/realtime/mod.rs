//! Presence and event fanout core.

pub mod events;
pub mod gateway;
pub mod lifecycle;
pub mod membership;
pub mod registry;
pub mod signaling;

pub use events::{ClientEvent, ServerEvent};
pub use gateway::Gateway;
pub use lifecycle::ConnectionManager;
pub use membership::MembershipTracker;
pub use registry::{Connection, IdentityRegistry, PresenceTransition};
pub use signaling::{CallEndReason, CallKind, CallPhase, CallRelay};
