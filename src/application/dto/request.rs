//! Request DTOs
//!
//! Data structures for API request bodies.

use serde::Deserialize;
use validator::Validate;

use crate::domain::{Attachment, FileKind, MessageContent, MessageStatus, UserId};

/// Reference to a file already uploaded to the blob store
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRequest {
    #[validate(url(message = "Attachment url must be a valid URL"))]
    pub url: String,

    #[validate(length(max = 255, message = "File name must be at most 255 characters"))]
    pub name: Option<String>,

    pub kind: FileKind,
}

/// Send message request (direct or group)
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    #[validate(length(max = 4000, message = "Message must be at most 4000 characters"))]
    pub text: Option<String>,

    #[validate(nested)]
    pub attachment: Option<AttachmentRequest>,
}

impl SendMessageRequest {
    pub fn into_content(self) -> MessageContent {
        MessageContent {
            text: self.text,
            attachment: self.attachment.map(|a| Attachment {
                url: a.url,
                name: a.name,
                kind: a.kind,
            }),
        }
    }
}

/// Explicit status update request
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: MessageStatus,
}

/// Add reaction request
#[derive(Debug, Deserialize, Validate)]
pub struct ReactionRequest {
    #[validate(length(min = 1, max = 32, message = "Emoji must be 1-32 characters"))]
    pub emoji: String,
}

/// Edit message request
#[derive(Debug, Deserialize, Validate)]
pub struct EditMessageRequest {
    #[validate(length(min = 1, max = 4000, message = "Message must be 1-4000 characters"))]
    pub text: String,
}

/// Forward message request
#[derive(Debug, Deserialize, Validate)]
pub struct ForwardMessageRequest {
    #[validate(length(min = 1, max = 128, message = "Recipient is required"))]
    pub to: String,
}

impl ForwardMessageRequest {
    pub fn recipient(&self) -> UserId {
        UserId::new(self.to.trim())
    }
}

/// Create group request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateGroupRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub members: Vec<UserId>,
}

/// Update group details; absent fields are left as they are
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateGroupRequest {
    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,
}

/// Add members to a group roster
#[derive(Debug, Deserialize, Validate)]
pub struct AddMembersRequest {
    #[validate(length(min = 1, message = "Please provide valid member IDs"))]
    pub members: Vec<UserId>,
}
