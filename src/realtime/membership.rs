//! Membership Tracker
//!
//! Transient room join-state: which identities are actively subscribed to a
//! room right now. Independent of liveness and of the durable roster.

use std::collections::HashSet;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::domain::{RoomId, UserId};

/// Room -> joined identities, with a reverse index so that dropping an
/// identity only touches the rooms it joined.
#[derive(Debug, Default)]
pub struct MembershipTracker {
    rooms: DashMap<RoomId, HashSet<UserId>>,
    joined: DashMap<UserId, HashSet<RoomId>>,
}

impl MembershipTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `user_id` to `room_id`. Returns false if it was already joined.
    pub fn join(&self, room_id: &RoomId, user_id: &UserId) -> bool {
        let added = self
            .rooms
            .entry(room_id.clone())
            .or_default()
            .insert(user_id.clone());
        self.joined
            .entry(user_id.clone())
            .or_default()
            .insert(room_id.clone());
        added
    }

    /// Remove `user_id` from `room_id`. Empty rooms are pruned.
    pub fn leave(&self, room_id: &RoomId, user_id: &UserId) -> bool {
        let removed = Self::remove_from(&self.rooms, room_id, user_id);
        Self::remove_from(&self.joined, user_id, room_id);
        removed
    }

    /// Remove `user_id` from every room it joined. Returns those rooms.
    pub fn leave_all(&self, user_id: &UserId) -> Vec<RoomId> {
        let rooms: Vec<RoomId> = match self.joined.remove(user_id) {
            Some((_, rooms)) => rooms.into_iter().collect(),
            None => return Vec::new(),
        };

        for room_id in &rooms {
            Self::remove_from(&self.rooms, room_id, user_id);
        }

        rooms
    }

    pub fn members_of(&self, room_id: &RoomId) -> Vec<UserId> {
        self.rooms
            .get(room_id)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn rooms_of(&self, user_id: &UserId) -> Vec<RoomId> {
        self.joined
            .get(user_id)
            .map(|rooms| rooms.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn is_joined(&self, room_id: &RoomId, user_id: &UserId) -> bool {
        self.rooms
            .get(room_id)
            .map(|members| members.contains(user_id))
            .unwrap_or(false)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    fn remove_from<K, V>(map: &DashMap<K, HashSet<V>>, key: &K, value: &V) -> bool
    where
        K: std::hash::Hash + Eq + Clone,
        V: std::hash::Hash + Eq,
    {
        match map.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                let removed = entry.get_mut().remove(value);
                if entry.get().is_empty() {
                    entry.remove();
                }
                removed
            }
            Entry::Vacant(_) => false,
        }
    }
}
