//! Message Service
//!
//! Direct message mutations and their fanout: send, status machine,
//! reactions, edits, deletes and forwarding. Every broadcast happens only
//! after the store confirmed the mutation; a failed request reaches the
//! requester as an error and nobody else sees anything.

use std::sync::Arc;

use crate::domain::{
    DirectMessage, MessageContent, MessageId, MessageRepository, MessageStatus, StatusChange,
    UserId,
};
use crate::realtime::{Gateway, ServerEvent};
use crate::shared::error::AppError;

pub struct MessageService {
    messages: Arc<dyn MessageRepository>,
    gateway: Arc<Gateway>,
}

impl MessageService {
    pub fn new(messages: Arc<dyn MessageRepository>, gateway: Arc<Gateway>) -> Self {
        Self { messages, gateway }
    }

    /// Persist and deliver a new message. A live receiver moves it straight
    /// to `delivered` and the sender is told so.
    pub async fn send_message(
        &self,
        sender: &UserId,
        receiver: &UserId,
        content: MessageContent,
    ) -> Result<DirectMessage, AppError> {
        if receiver.is_blank() {
            return Err(AppError::Validation("Receiver is required".into()));
        }
        if sender == receiver {
            return Err(AppError::Validation("Cannot send a message to yourself".into()));
        }
        let content = content.normalized()?;

        let message = DirectMessage::new(sender.clone(), receiver.clone(), content);
        let saved = self.messages.create(&message).await?;

        tracing::debug!(
            message_id = %saved.id,
            sender = %sender,
            receiver = %receiver,
            "Direct message stored"
        );

        let reached = self
            .gateway
            .send_to_identity(receiver, &ServerEvent::NewMessage(saved.clone()));
        if reached == 0 {
            return Ok(saved);
        }

        match self
            .messages
            .advance_status(saved.id, MessageStatus::Delivered)
            .await
        {
            Ok(write) => {
                if write.advanced() {
                    self.gateway.send_to_identity(
                        sender,
                        &ServerEvent::MessageStatusChanged {
                            message_id: write.record.id,
                            status: MessageStatus::Delivered,
                        },
                    );
                }
                Ok(write.record)
            }
            Err(e) => {
                // Already stored and pushed; report it as sent.
                tracing::warn!(
                    message_id = %saved.id,
                    error = %e,
                    "Failed to record delivery"
                );
                Ok(saved)
            }
        }
    }

    /// Conversation between `reader` and `other`, oldest first. Opening it
    /// marks every message addressed to `reader` as read. Authors get one
    /// status event per message this call actually moved to read.
    pub async fn get_conversation(
        &self,
        reader: &UserId,
        other: &UserId,
    ) -> Result<Vec<DirectMessage>, AppError> {
        let mut conversation = self.messages.find_conversation(reader, other).await?;

        let unread: Vec<MessageId> = conversation
            .iter()
            .filter(|m| m.is_unread_by(reader))
            .map(|m| m.id)
            .collect();
        if unread.is_empty() {
            return Ok(conversation);
        }

        let newly_read = self.messages.mark_read(&unread).await?;

        for message in conversation.iter_mut().filter(|m| m.is_unread_by(reader)) {
            message.status = MessageStatus::Read;
            if !newly_read.contains(&message.id) {
                continue;
            }
            self.gateway.send_to_identity(
                &message.sender_id,
                &ServerEvent::MessageStatusChanged {
                    message_id: message.id,
                    status: MessageStatus::Read,
                },
            );
        }

        tracing::debug!(
            reader = %reader,
            other = %other,
            count = newly_read.len(),
            "Conversation read"
        );
        Ok(conversation)
    }

    /// Explicit status update by the receiver. Only `delivered` and `read`
    /// can be requested and status never moves backward.
    pub async fn update_status(
        &self,
        actor: &UserId,
        message_id: MessageId,
        status: MessageStatus,
    ) -> Result<DirectMessage, AppError> {
        if status == MessageStatus::Sent {
            return Err(AppError::Validation(
                "Status must be 'delivered' or 'read'".into(),
            ));
        }

        let message = self.find(message_id).await?;
        if &message.receiver_id != actor {
            return Err(AppError::Forbidden(
                "Only the receiver can update message status".into(),
            ));
        }

        if message.status.transition_to(status)? == StatusChange::Unchanged {
            return Ok(message);
        }

        let write = self.messages.advance_status(message_id, status).await?;
        if !write.advanced() {
            // A concurrent write got there first; judge against what is stored.
            write.record.status.transition_to(status)?;
            return Ok(write.record);
        }

        self.gateway.send_to_identity(
            &write.record.sender_id,
            &ServerEvent::MessageStatusChanged {
                message_id,
                status,
            },
        );
        Ok(write.record)
    }

    /// Place or replace `actor`'s reaction.
    pub async fn add_reaction(
        &self,
        actor: &UserId,
        message_id: MessageId,
        emoji: &str,
    ) -> Result<DirectMessage, AppError> {
        let emoji = emoji.trim();
        if emoji.is_empty() {
            return Err(AppError::Validation("Emoji is required".into()));
        }

        self.find_as_participant(actor, message_id).await?;

        let updated = self.messages.set_reaction(message_id, actor, emoji).await?;
        self.broadcast_reactions(&updated);
        Ok(updated)
    }

    /// Remove `actor`'s reaction. Fails if there is none.
    pub async fn remove_reaction(
        &self,
        actor: &UserId,
        message_id: MessageId,
    ) -> Result<DirectMessage, AppError> {
        self.find_as_participant(actor, message_id).await?;

        let updated = self.messages.remove_reaction(message_id, actor).await?;
        self.broadcast_reactions(&updated);
        Ok(updated)
    }

    pub async fn edit_message(
        &self,
        actor: &UserId,
        message_id: MessageId,
        text: &str,
    ) -> Result<DirectMessage, AppError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::Validation("Message cannot be empty".into()));
        }

        let message = self.find(message_id).await?;
        if &message.sender_id != actor {
            return Err(AppError::Forbidden("Only the author can edit this message".into()));
        }

        let updated = self.messages.update_text(message_id, text).await?;
        let event = ServerEvent::MessageEdited {
            message_id,
            group_id: None,
            text: text.to_string(),
            is_edited: true,
        };
        self.gateway
            .send_to_identities([&updated.sender_id, &updated.receiver_id], &event);
        Ok(updated)
    }

    pub async fn delete_message(&self, actor: &UserId, message_id: MessageId) -> Result<(), AppError> {
        let message = self.find(message_id).await?;
        if &message.sender_id != actor {
            return Err(AppError::Forbidden(
                "Only the author can delete this message".into(),
            ));
        }

        if !self.messages.delete(message_id).await? {
            return Err(AppError::NotFound(format!("Message {}", message_id)));
        }

        tracing::debug!(message_id = %message_id, actor = %actor, "Direct message deleted");
        let event = ServerEvent::MessageDeleted {
            message_id,
            group_id: None,
        };
        self.gateway
            .send_to_identities([&message.sender_id, &message.receiver_id], &event);
        Ok(())
    }

    /// Re-send an existing message's content from `actor` to `to`.
    pub async fn forward_message(
        &self,
        actor: &UserId,
        message_id: MessageId,
        to: &UserId,
    ) -> Result<DirectMessage, AppError> {
        let original = self.find_as_participant(actor, message_id).await?;
        let content = MessageContent {
            text: original.text,
            attachment: original.attachment,
        };
        self.send_message(actor, to, content).await
    }

    async fn find(&self, message_id: MessageId) -> Result<DirectMessage, AppError> {
        self.messages
            .find_by_id(message_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Message {}", message_id)))
    }

    async fn find_as_participant(
        &self,
        actor: &UserId,
        message_id: MessageId,
    ) -> Result<DirectMessage, AppError> {
        let message = self.find(message_id).await?;
        if !message.is_participant(actor) {
            return Err(AppError::Forbidden(
                "Not a participant of this conversation".into(),
            ));
        }
        Ok(message)
    }

    fn broadcast_reactions(&self, message: &DirectMessage) {
        let event = ServerEvent::ReactionsChanged {
            message_id: message.id,
            group_id: None,
            reactions: message.reactions.clone(),
        };
        self.gateway
            .send_to_identities([&message.sender_id, &message.receiver_id], &event);
    }
}
