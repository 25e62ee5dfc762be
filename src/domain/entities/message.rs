//! Direct message entity, delivery status machine and repository trait.
//!
//! Maps to the `messages` table in the database schema.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::reaction::Reactions;
use crate::domain::{MessageId, UserId};
use crate::shared::error::AppError;

/// Delivery status of a message.
///
/// Ordered: `Sent < Delivered < Read`. Status only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    #[default]
    Sent,
    Delivered,
    Read,
}

/// Outcome of applying a status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    Advanced,
    Unchanged,
}

/// A forward-only status write: the stored record afterwards, and whether
/// this write is the one that moved it.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusWrite<T> {
    pub record: T,
    pub change: StatusChange,
}

impl<T> StatusWrite<T> {
    pub fn advanced(&self) -> bool {
        self.change == StatusChange::Advanced
    }
}

impl MessageStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sent" => Some(Self::Sent),
            "delivered" => Some(Self::Delivered),
            "read" => Some(Self::Read),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Delivered => "delivered",
            Self::Read => "read",
        }
    }

    /// Position in the forward order, as compared by the SQL store.
    pub fn rank(self) -> i16 {
        match self {
            Self::Sent => 0,
            Self::Delivered => 1,
            Self::Read => 2,
        }
    }

    /// Check a transition to `next`. Moving backward is rejected; asking for
    /// the current status again is accepted as a no-op.
    pub fn transition_to(self, next: MessageStatus) -> Result<StatusChange, AppError> {
        if next < self {
            return Err(AppError::InvalidTransition(format!(
                "cannot move message status from {} to {}",
                self, next
            )));
        }
        if next == self {
            return Ok(StatusChange::Unchanged);
        }
        Ok(StatusChange::Advanced)
    }
}

impl std::fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of file referenced by an attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Image,
    Document,
    Video,
    Audio,
}

/// Reference to a file already uploaded to the blob store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub kind: FileKind,
}

/// Content of a new message: text, an attachment, or both.
#[derive(Debug, Clone, Default)]
pub struct MessageContent {
    pub text: Option<String>,
    pub attachment: Option<Attachment>,
}

impl MessageContent {
    /// Reject content with neither text nor attachment. Text is trimmed;
    /// whitespace-only text counts as empty.
    pub fn normalized(self) -> Result<Self, AppError> {
        let text = self
            .text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        if text.is_none() && self.attachment.is_none() {
            return Err(AppError::Validation("Message cannot be empty".into()));
        }
        Ok(Self {
            text,
            attachment: self.attachment,
        })
    }
}

/// A one-to-one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectMessage {
    pub id: MessageId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
    pub status: MessageStatus,
    pub is_edited: bool,
    pub reactions: Reactions,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DirectMessage {
    /// A freshly sent message, not yet persisted.
    pub fn new(sender_id: UserId, receiver_id: UserId, content: MessageContent) -> Self {
        let now = Utc::now();
        Self {
            id: MessageId::new(),
            sender_id,
            receiver_id,
            text: content.text,
            attachment: content.attachment,
            status: MessageStatus::Sent,
            is_edited: false,
            reactions: Reactions::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_participant(&self, user_id: &UserId) -> bool {
        &self.sender_id == user_id || &self.receiver_id == user_id
    }

    /// Whether opening the conversation as `reader` should mark this read.
    pub fn is_unread_by(&self, reader: &UserId) -> bool {
        &self.receiver_id == reader && self.status != MessageStatus::Read
    }
}

/// Durable store operations for direct messages.
///
/// Every mutating call returns the canonical persisted record, which is what
/// gets broadcast.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Find a message by id. Deleted messages are not found.
    async fn find_by_id(&self, id: MessageId) -> Result<Option<DirectMessage>, AppError>;

    /// All messages between two identities, oldest first.
    async fn find_conversation(
        &self,
        user_a: &UserId,
        user_b: &UserId,
    ) -> Result<Vec<DirectMessage>, AppError>;

    /// Persist a new message.
    async fn create(&self, message: &DirectMessage) -> Result<DirectMessage, AppError>;

    /// Move the status forward to `status`. A record already at or past
    /// `status` is left alone and reported as `Unchanged`.
    async fn advance_status(
        &self,
        id: MessageId,
        status: MessageStatus,
    ) -> Result<StatusWrite<DirectMessage>, AppError>;

    /// Mark a batch of messages read. Returns the ids this call moved to
    /// read; ids already read (or missing) are left out.
    async fn mark_read(&self, ids: &[MessageId]) -> Result<Vec<MessageId>, AppError>;

    /// Record `emoji` as the reaction of `user_id`, replacing theirs.
    async fn set_reaction(
        &self,
        id: MessageId,
        user_id: &UserId,
        emoji: &str,
    ) -> Result<DirectMessage, AppError>;

    /// Drop the reaction of `user_id`; `NoReaction` if they had none.
    async fn remove_reaction(
        &self,
        id: MessageId,
        user_id: &UserId,
    ) -> Result<DirectMessage, AppError>;

    /// Rewrite the text and set the edited flag.
    async fn update_text(&self, id: MessageId, text: &str) -> Result<DirectMessage, AppError>;

    /// Permanently delete a message. Returns false if it did not exist.
    async fn delete(&self, id: MessageId) -> Result<bool, AppError>;
}
