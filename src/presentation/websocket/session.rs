//! WebSocket Session State
//!
//! Per-connection state machine `Connecting -> Connected -> Disconnected`
//! and heartbeat liveness.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Upgraded, waiting for `identify`.
    Connecting,
    /// Identified and registered.
    Connected,
    /// Terminal.
    Disconnected,
}

#[derive(Debug)]
pub struct SessionState {
    state: ConnectionState,
    last_heartbeat: Instant,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            state: ConnectionState::Connecting,
            last_heartbeat: Instant::now(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn mark_connected(&mut self) {
        if self.state == ConnectionState::Connecting {
            self.state = ConnectionState::Connected;
            self.last_heartbeat = Instant::now();
        }
    }

    /// Returns true only for the first call, so cleanup runs once.
    pub fn mark_disconnected(&mut self) -> bool {
        let was_connected = self.state == ConnectionState::Connected;
        self.state = ConnectionState::Disconnected;
        was_connected
    }

    pub fn heartbeat(&mut self) {
        self.last_heartbeat = Instant::now();
    }

    pub fn is_alive(&self, deadline: Duration) -> bool {
        self.last_heartbeat.elapsed() < deadline
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
