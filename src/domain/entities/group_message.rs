//! Group message entity and repository trait.
//!
//! Group messages only move `sent -> delivered`. Reading is a per-member
//! fact recorded in `read_by`.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::{Attachment, MessageContent, MessageStatus, StatusWrite};
use super::reaction::Reactions;
use crate::domain::{MessageId, RoomId, UserId};
use crate::shared::error::AppError;

/// A message posted to a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMessage {
    pub id: MessageId,
    pub group_id: RoomId,
    pub sender_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
    pub status: MessageStatus,
    pub is_edited: bool,
    pub read_by: BTreeSet<UserId>,
    pub reactions: Reactions,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GroupMessage {
    pub fn new(group_id: RoomId, sender_id: UserId, content: MessageContent) -> Self {
        let now = Utc::now();
        Self {
            id: MessageId::new(),
            group_id,
            sender_id,
            text: content.text,
            attachment: content.attachment,
            status: MessageStatus::Sent,
            is_edited: false,
            read_by: BTreeSet::new(),
            reactions: Reactions::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Group messages never reach `read`; that is tracked per member.
    pub fn check_status(status: MessageStatus) -> Result<(), AppError> {
        if status == MessageStatus::Read {
            return Err(AppError::InvalidTransition(
                "group messages track reads per member".into(),
            ));
        }
        Ok(())
    }
}

/// Durable store operations for group messages.
#[async_trait]
pub trait GroupMessageRepository: Send + Sync {
    async fn find_by_id(&self, id: MessageId) -> Result<Option<GroupMessage>, AppError>;

    /// All messages of a group, oldest first.
    async fn find_by_group(&self, group_id: &RoomId) -> Result<Vec<GroupMessage>, AppError>;

    async fn create(&self, message: &GroupMessage) -> Result<GroupMessage, AppError>;

    /// Forward-only, like the direct message store. `Read` is rejected.
    async fn advance_status(
        &self,
        id: MessageId,
        status: MessageStatus,
    ) -> Result<StatusWrite<GroupMessage>, AppError>;

    /// Add `reader` to the read-by set. Returns true only on first insertion.
    async fn add_reader(&self, id: MessageId, reader: &UserId) -> Result<bool, AppError>;

    async fn set_reaction(
        &self,
        id: MessageId,
        user_id: &UserId,
        emoji: &str,
    ) -> Result<GroupMessage, AppError>;

    /// `NoReaction` if `user_id` had none.
    async fn remove_reaction(
        &self,
        id: MessageId,
        user_id: &UserId,
    ) -> Result<GroupMessage, AppError>;

    async fn update_text(&self, id: MessageId, text: &str) -> Result<GroupMessage, AppError>;

    async fn delete(&self, id: MessageId) -> Result<bool, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_is_not_a_group_status() {
        assert!(GroupMessage::check_status(MessageStatus::Delivered).is_ok());
        assert!(matches!(
            GroupMessage::check_status(MessageStatus::Read),
            Err(AppError::InvalidTransition(_))
        ));
    }

    #[test]
    fn test_read_by_serializes_as_list() {
        let mut msg = GroupMessage::new(
            RoomId::new("g"),
            UserId::new("a"),
            MessageContent {
                text: Some("hello".into()),
                attachment: None,
            },
        );
        msg.read_by.insert(UserId::new("b"));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["readBy"], serde_json::json!(["b"]));
        assert_eq!(json["status"], "sent");
    }
}
