//! Identity Registry
//!
//! Maps each identity to its live connection handles. An identity is
//! present iff it holds at least one handle; this is the single source of
//! truth for who is online.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::mpsc;

use super::events::ServerEvent;
use crate::domain::{ConnectionId, UserId};

/// A live connection handle owned by one identity.
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub user_id: UserId,
    pub connected_at: DateTime<Utc>,
    sender: mpsc::UnboundedSender<ServerEvent>,
}

impl Connection {
    pub fn new(user_id: UserId, sender: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self {
            id: ConnectionId::new(),
            user_id,
            connected_at: Utc::now(),
            sender,
        }
    }

    /// Push an event to the connection's writer. Fails silently (returns
    /// false) if the transport is already gone.
    pub fn send(&self, event: ServerEvent) -> bool {
        self.sender.send(event).is_ok()
    }
}

/// Presence effect of a registry operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresenceTransition {
    /// First handle for the identity.
    Online,
    /// Last handle of the identity removed.
    Offline,
    Unchanged,
}

/// Identity -> live handles.
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    connections: DashMap<ConnectionId, Arc<Connection>>,
    identities: DashMap<UserId, HashSet<ConnectionId>>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handle under its identity. Idempotent per handle.
    pub fn register(&self, connection: Arc<Connection>) -> PresenceTransition {
        let id = connection.id;
        let user_id = connection.user_id.clone();

        // The handle must be resolvable before the identity lists it.
        self.connections.insert(id, connection);

        let mut handles = self.identities.entry(user_id).or_default();
        let was_offline = handles.is_empty();
        if !handles.insert(id) {
            return PresenceTransition::Unchanged;
        }
        if was_offline {
            PresenceTransition::Online
        } else {
            PresenceTransition::Unchanged
        }
    }

    /// Remove a handle. Unknown identities or handles are a no-op.
    pub fn unregister(&self, user_id: &UserId, connection_id: ConnectionId) -> PresenceTransition {
        let transition = match self.identities.entry(user_id.clone()) {
            Entry::Occupied(mut entry) => {
                if !entry.get_mut().remove(&connection_id) {
                    PresenceTransition::Unchanged
                } else if entry.get().is_empty() {
                    entry.remove();
                    PresenceTransition::Offline
                } else {
                    PresenceTransition::Unchanged
                }
            }
            Entry::Vacant(_) => PresenceTransition::Unchanged,
        };

        self.connections
            .remove_if(&connection_id, |_, conn| &conn.user_id == user_id);

        transition
    }

    pub fn is_online(&self, user_id: &UserId) -> bool {
        self.identities
            .get(user_id)
            .map(|handles| !handles.is_empty())
            .unwrap_or(false)
    }

    /// All live handles of an identity (every device).
    pub fn handles_for(&self, user_id: &UserId) -> Vec<Arc<Connection>> {
        let ids: Vec<ConnectionId> = match self.identities.get(user_id) {
            Some(handles) => handles.iter().copied().collect(),
            None => return Vec::new(),
        };

        ids.iter()
            .filter_map(|id| self.connections.get(id).map(|c| Arc::clone(c.value())))
            .collect()
    }

    pub fn connection(&self, connection_id: ConnectionId) -> Option<Arc<Connection>> {
        self.connections
            .get(&connection_id)
            .map(|c| Arc::clone(c.value()))
    }

    /// Every identity currently online, sorted for stable broadcasts.
    pub fn online_identities(&self) -> Vec<UserId> {
        let mut ids: Vec<UserId> = self
            .identities
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        ids
    }

    /// Every live handle, for global broadcasts.
    pub fn all_connections(&self) -> Vec<Arc<Connection>> {
        self.connections
            .iter()
            .map(|c| Arc::clone(c.value()))
            .collect()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn identity_count(&self) -> usize {
        self.identities.len()
    }
}
