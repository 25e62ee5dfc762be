//! Group roster entity and repository trait.
//!
//! The roster is the durable list of authorized members. It is distinct
//! from the transient room membership tracked by the realtime layer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{RoomId, UserId};
use crate::shared::error::AppError;

/// A group chat and its roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: RoomId,
    pub name: String,
    pub description: String,
    pub admin_id: UserId,
    pub members: Vec<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Group {
    /// Create a group. The admin is always a member.
    pub fn new(name: String, description: String, admin_id: UserId, members: Vec<UserId>) -> Self {
        let now = Utc::now();
        let mut roster: Vec<UserId> = Vec::with_capacity(members.len() + 1);
        for member in std::iter::once(admin_id.clone()).chain(members) {
            if !roster.contains(&member) {
                roster.push(member);
            }
        }
        Self {
            id: RoomId::new(uuid::Uuid::now_v7().to_string()),
            name,
            description,
            admin_id,
            members: roster,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_member(&self, user_id: &UserId) -> bool {
        self.members.contains(user_id)
    }

    pub fn is_admin(&self, user_id: &UserId) -> bool {
        &self.admin_id == user_id
    }
}

/// Durable store operations for group rosters.
#[async_trait]
pub trait GroupRepository: Send + Sync {
    async fn find_by_id(&self, id: &RoomId) -> Result<Option<Group>, AppError>;

    /// Roster of a group; empty if the group does not exist.
    async fn list_members(&self, id: &RoomId) -> Result<Vec<UserId>, AppError>;

    async fn create(&self, group: &Group) -> Result<Group, AppError>;

    /// Groups whose roster contains `user_id`, most recently updated first.
    async fn list_for_member(&self, user_id: &UserId) -> Result<Vec<Group>, AppError>;

    /// Overwrite the fields that are `Some`.
    async fn update_details(
        &self,
        id: &RoomId,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Group, AppError>;

    /// Add identities to the roster. Existing members are skipped.
    async fn add_members(&self, id: &RoomId, members: &[UserId]) -> Result<Group, AppError>;

    /// Drop one identity from the roster. Absent members are a no-op.
    async fn remove_member(&self, id: &RoomId, member: &UserId) -> Result<Group, AppError>;

    /// Delete the group together with its messages. Returns false if it
    /// did not exist.
    async fn delete(&self, id: &RoomId) -> Result<bool, AppError>;
}
