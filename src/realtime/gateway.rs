//! Gateway
//!
//! Event Router delivery: resolves a target (identity, room, or everyone)
//! to live connection handles through the registry and membership tracker
//! and pushes the event. Delivery is fire-and-forget; an identity with no
//! live handle simply receives nothing.

use std::collections::HashSet;

use super::events::ServerEvent;
use super::membership::MembershipTracker;
use super::registry::IdentityRegistry;
use crate::domain::{ConnectionId, RoomId, UserId};
use crate::infrastructure::metrics;

/// Presence and fanout state of one server process.
#[derive(Debug)]
pub struct Gateway {
    registry: IdentityRegistry,
    membership: MembershipTracker,
    heartbeat_interval_ms: u64,
}

impl Gateway {
    pub fn new(heartbeat_interval_ms: u64) -> Self {
        Self {
            registry: IdentityRegistry::new(),
            membership: MembershipTracker::new(),
            heartbeat_interval_ms,
        }
    }

    pub fn registry(&self) -> &IdentityRegistry {
        &self.registry
    }

    pub fn membership(&self) -> &MembershipTracker {
        &self.membership
    }

    pub fn heartbeat_interval(&self) -> u64 {
        self.heartbeat_interval_ms
    }

    /// Deliver to one specific connection. Used for request error acks,
    /// which go only to the device that sent the request.
    pub fn send_to_connection(&self, connection_id: ConnectionId, event: ServerEvent) -> bool {
        match self.registry.connection(connection_id) {
            Some(conn) => {
                let name = event.name();
                let sent = conn.send(event);
                if sent {
                    metrics::record_delivery(name, 1);
                }
                sent
            }
            None => false,
        }
    }

    /// Deliver to every device of `user_id`. Returns the number of handles
    /// reached; zero means the event was dropped.
    pub fn send_to_identity(&self, user_id: &UserId, event: &ServerEvent) -> usize {
        let handles = self.registry.handles_for(user_id);
        let delivered = handles
            .iter()
            .filter(|conn| conn.send(event.clone()))
            .count();

        if delivered == 0 {
            metrics::record_dropped(event.name());
            tracing::debug!(
                user_id = %user_id,
                event = event.name(),
                "Recipient offline, event dropped"
            );
        } else {
            metrics::record_delivery(event.name(), delivered);
        }
        delivered
    }

    /// Deliver to each distinct identity in `user_ids`.
    pub fn send_to_identities<'a, I>(&self, user_ids: I, event: &ServerEvent) -> usize
    where
        I: IntoIterator<Item = &'a UserId>,
    {
        let mut seen = HashSet::new();
        user_ids
            .into_iter()
            .filter(|id| seen.insert(*id))
            .map(|id| self.send_to_identity(id, event))
            .sum()
    }

    /// Deliver to every joined member of a room, optionally skipping one
    /// identity (all of its devices) to avoid echoing back to the sender.
    pub fn send_to_room(
        &self,
        room_id: &RoomId,
        event: &ServerEvent,
        exclude: Option<&UserId>,
    ) -> usize {
        let members = self.membership.members_of(room_id);
        let mut delivered = 0;
        for member in members.iter().filter(|m| Some(*m) != exclude) {
            for conn in self.registry.handles_for(member) {
                if conn.send(event.clone()) {
                    delivered += 1;
                }
            }
        }

        if delivered > 0 {
            metrics::record_delivery(event.name(), delivered);
        }
        tracing::trace!(
            room_id = %room_id,
            event = event.name(),
            delivered,
            "Room fanout"
        );
        delivered
    }

    /// Deliver to every live connection.
    pub fn broadcast(&self, event: &ServerEvent) -> usize {
        let delivered = self
            .registry
            .all_connections()
            .iter()
            .filter(|conn| conn.send(event.clone()))
            .count();
        metrics::record_delivery(event.name(), delivered);
        delivered
    }

    /// Joined members of a room that are currently online.
    pub fn room_presence(&self, room_id: &RoomId) -> Vec<UserId> {
        let mut online: Vec<UserId> = self
            .membership
            .members_of(room_id)
            .into_iter()
            .filter(|m| self.registry.is_online(m))
            .collect();
        online.sort();
        online
    }

    /// Send the full online-identity list to everyone.
    pub fn broadcast_presence(&self) {
        self.broadcast(&ServerEvent::PresenceChanged {
            online_identities: self.registry.online_identities(),
        });
    }

    /// Send a room's online members to the room.
    pub fn broadcast_room_presence(&self, room_id: &RoomId) {
        let event = ServerEvent::RoomPresenceChanged {
            room_id: room_id.clone(),
            online_members: self.room_presence(room_id),
        };
        self.send_to_room(room_id, &event, None);
    }
}

impl Default for Gateway {
    fn default() -> Self {
        Self::new(41_250)
    }
}
