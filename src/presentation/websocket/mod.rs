//! WebSocket Gateway
//!
//! Real-time transport: upgrade, identify, heartbeat and event dispatch.

pub mod dispatch;
pub mod handler;
pub mod session;

pub use dispatch::dispatch_client_event;
pub use handler::ws_handler;
pub use session::{ConnectionState, SessionState};
