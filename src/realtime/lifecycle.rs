//! Connection Lifecycle
//!
//! `Connecting -> Connected -> Disconnected`. Owns the registry, membership
//! and call cleanup that goes with each transition, plus the presence
//! broadcasts that follow.

use std::sync::Arc;

use tokio::sync::mpsc;

use super::events::ServerEvent;
use super::gateway::Gateway;
use super::registry::{Connection, PresenceTransition};
use super::signaling::CallRelay;
use crate::domain::{GroupRepository, RoomId, UserId};
use crate::infrastructure::metrics;
use crate::shared::error::AppError;

pub struct ConnectionManager {
    gateway: Arc<Gateway>,
    calls: Arc<CallRelay>,
    groups: Arc<dyn GroupRepository>,
}

impl ConnectionManager {
    pub fn new(
        gateway: Arc<Gateway>,
        calls: Arc<CallRelay>,
        groups: Arc<dyn GroupRepository>,
    ) -> Self {
        Self {
            gateway,
            calls,
            groups,
        }
    }

    pub fn gateway(&self) -> &Arc<Gateway> {
        &self.gateway
    }

    pub fn calls(&self) -> &Arc<CallRelay> {
        &self.calls
    }

    /// Enter `Connected`: send `ready`, register the handle and, if the
    /// identity just came online, broadcast the new online list.
    pub fn connect(
        &self,
        user_id: UserId,
        sender: mpsc::UnboundedSender<ServerEvent>,
    ) -> Arc<Connection> {
        let connection = Arc::new(Connection::new(user_id, sender));
        connection.send(ServerEvent::Ready {
            connection_id: connection.id,
            user_id: connection.user_id.clone(),
            heartbeat_interval_ms: self.gateway.heartbeat_interval(),
        });

        let transition = self.gateway.registry().register(Arc::clone(&connection));
        self.record_presence();

        tracing::info!(
            user_id = %connection.user_id,
            connection_id = %connection.id,
            first_device = transition == PresenceTransition::Online,
            "Connection registered"
        );

        if transition == PresenceTransition::Online {
            self.gateway.broadcast_presence();
        }
        connection
    }

    /// Subscribe to a room. Only members of the durable roster may join.
    pub async fn join_room(&self, user_id: &UserId, room_id: &RoomId) -> Result<(), AppError> {
        if room_id.is_blank() {
            return Err(AppError::Validation("roomId is required".into()));
        }

        let roster = self.groups.list_members(room_id).await?;
        if roster.is_empty() {
            return Err(AppError::NotFound(format!("Room {}", room_id)));
        }
        if !roster.contains(user_id) {
            return Err(AppError::Forbidden("Not a member of this room".into()));
        }

        if self.gateway.membership().join(room_id, user_id) {
            tracing::debug!(user_id = %user_id, room_id = %room_id, "Joined room");
            self.gateway.broadcast_room_presence(room_id);
        }
        Ok(())
    }

    /// Unsubscribe from a room. Leaving a room never joined is a no-op.
    pub fn leave_room(&self, user_id: &UserId, room_id: &RoomId) {
        if self.gateway.membership().leave(room_id, user_id) {
            tracing::debug!(user_id = %user_id, room_id = %room_id, "Left room");
            self.gateway.broadcast_room_presence(room_id);
        }
    }

    /// Enter `Disconnected`. The handle is unregistered before anything
    /// else so no later event can be routed to it. Calls bound to this
    /// device end right away; room state and any remaining calls are torn
    /// down only once the identity has no device left.
    pub fn disconnect(&self, connection: &Connection) {
        let transition = self
            .gateway
            .registry()
            .unregister(&connection.user_id, connection.id);
        self.record_presence();

        tracing::info!(
            user_id = %connection.user_id,
            connection_id = %connection.id,
            last_device = transition == PresenceTransition::Offline,
            "Connection closed"
        );

        self.calls.drop_connection(&connection.user_id, connection.id);

        if transition != PresenceTransition::Offline {
            return;
        }

        let rooms = self.gateway.membership().leave_all(&connection.user_id);
        for room_id in &rooms {
            self.gateway.broadcast_room_presence(room_id);
        }

        self.calls.drop_identity(&connection.user_id);
        self.gateway.broadcast_presence();
    }

    fn record_presence(&self) {
        let registry = self.gateway.registry();
        metrics::set_presence(registry.connection_count(), registry.identity_count());
    }
}
