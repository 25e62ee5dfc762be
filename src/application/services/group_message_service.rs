//! Group Message Service
//!
//! Group rosters and group message mutations. Events fan out to the room's
//! joined members; authorization is checked against the durable roster
//! before any mutation.

use std::sync::Arc;

use crate::domain::{
    Group, GroupMessage, GroupMessageRepository, GroupRepository, MessageContent, MessageId,
    MessageStatus, RoomId, UserId,
};
use crate::realtime::{Gateway, ServerEvent};
use crate::shared::error::AppError;

pub struct GroupMessageService {
    groups: Arc<dyn GroupRepository>,
    messages: Arc<dyn GroupMessageRepository>,
    gateway: Arc<Gateway>,
}

impl GroupMessageService {
    pub fn new(
        groups: Arc<dyn GroupRepository>,
        messages: Arc<dyn GroupMessageRepository>,
        gateway: Arc<Gateway>,
    ) -> Self {
        Self {
            groups,
            messages,
            gateway,
        }
    }

    pub async fn create_group(
        &self,
        admin: &UserId,
        name: &str,
        description: &str,
        members: Vec<UserId>,
    ) -> Result<Group, AppError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Group name is required".into()));
        }
        let members = members.into_iter().filter(|m| !m.is_blank()).collect();

        let group = Group::new(name.to_string(), description.trim().to_string(), admin.clone(), members);
        let created = self.groups.create(&group).await?;

        tracing::info!(group_id = %created.id, admin = %admin, members = created.members.len(), "Group created");
        Ok(created)
    }

    /// Roster lookup, visible to members only.
    pub async fn get_group(&self, actor: &UserId, group_id: &RoomId) -> Result<Group, AppError> {
        self.group_for_member(actor, group_id).await
    }

    /// Groups `actor` belongs to, most recently updated first.
    pub async fn list_user_groups(&self, actor: &UserId) -> Result<Vec<Group>, AppError> {
        self.groups.list_for_member(actor).await
    }

    /// Admin only. A blank name leaves the current one in place.
    pub async fn update_group(
        &self,
        actor: &UserId,
        group_id: &RoomId,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Group, AppError> {
        self.group_for_admin(actor, group_id).await?;
        let name = name.map(str::trim).filter(|n| !n.is_empty());
        let description = description.map(str::trim);

        self.groups.update_details(group_id, name, description).await
    }

    /// Admin only. Members already on the roster are skipped.
    pub async fn add_members(
        &self,
        actor: &UserId,
        group_id: &RoomId,
        members: Vec<UserId>,
    ) -> Result<Group, AppError> {
        let members: Vec<UserId> = members.into_iter().filter(|m| !m.is_blank()).collect();
        if members.is_empty() {
            return Err(AppError::Validation("Please provide valid member IDs".into()));
        }
        self.group_for_admin(actor, group_id).await?;

        let updated = self.groups.add_members(group_id, &members).await?;
        tracing::info!(group_id = %group_id, added = members.len(), "Group members added");
        Ok(updated)
    }

    /// The admin may remove anyone but themselves; any other member may
    /// only remove themselves. A removed member is dropped from the live
    /// room at once and the room sees the new presence list.
    pub async fn remove_member(
        &self,
        actor: &UserId,
        group_id: &RoomId,
        member: &UserId,
    ) -> Result<Group, AppError> {
        let group = self.find_group(group_id).await?;
        if !group.is_admin(actor) && actor != member {
            return Err(AppError::Forbidden(
                "You don't have permission to remove this member".into(),
            ));
        }
        if group.is_admin(member) {
            return Err(AppError::BadRequest(
                "Admin cannot leave the group; delete it instead".into(),
            ));
        }

        let updated = self.groups.remove_member(group_id, member).await?;
        if self.gateway.membership().leave(group_id, member) {
            self.gateway.broadcast_room_presence(group_id);
        }

        tracing::info!(group_id = %group_id, member = %member, actor = %actor, "Group member removed");
        Ok(updated)
    }

    /// Admin only. Deletes the group and its messages and empties the live
    /// room; identities that had it joined get an empty presence list.
    pub async fn delete_group(&self, actor: &UserId, group_id: &RoomId) -> Result<(), AppError> {
        self.group_for_admin(actor, group_id).await?;

        if !self.groups.delete(group_id).await? {
            return Err(AppError::NotFound(format!("Group {}", group_id)));
        }

        let joined = self.gateway.membership().members_of(group_id);
        for member in &joined {
            self.gateway.membership().leave(group_id, member);
        }
        self.gateway.send_to_identities(
            &joined,
            &ServerEvent::RoomPresenceChanged {
                room_id: group_id.clone(),
                online_members: Vec::new(),
            },
        );

        tracing::info!(group_id = %group_id, actor = %actor, "Group deleted");
        Ok(())
    }

    /// Post to a group. Joined members other than the sender get
    /// `newGroupMessage`; if any of them was reached the message becomes
    /// `delivered`.
    pub async fn send(
        &self,
        sender: &UserId,
        group_id: &RoomId,
        content: MessageContent,
    ) -> Result<GroupMessage, AppError> {
        self.group_for_member(sender, group_id).await?;
        let content = content.normalized()?;

        let message = GroupMessage::new(group_id.clone(), sender.clone(), content);
        let saved = self.messages.create(&message).await?;

        let reached = self.gateway.send_to_room(
            group_id,
            &ServerEvent::NewGroupMessage(saved.clone()),
            Some(sender),
        );
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
                        &ServerEvent::GroupMessageStatusChanged {
                            message_id: write.record.id,
                            group_id: group_id.clone(),
                            status: MessageStatus::Delivered,
                        },
                    );
                }
                Ok(write.record)
            }
            Err(e) => {
                tracing::warn!(message_id = %saved.id, error = %e, "Failed to record group delivery");
                Ok(saved)
            }
        }
    }

    pub async fn list(&self, actor: &UserId, group_id: &RoomId) -> Result<Vec<GroupMessage>, AppError> {
        self.group_for_member(actor, group_id).await?;
        self.messages.find_by_group(group_id).await
    }

    /// Record that `reader` has read the message. Only the first read by a
    /// member emits `groupMessageRead`; repeats are no-ops.
    pub async fn mark_read(&self, reader: &UserId, message_id: MessageId) -> Result<GroupMessage, AppError> {
        let (mut message, _) = self.message_for_member(reader, message_id).await?;
        if &message.sender_id == reader {
            return Ok(message);
        }

        if self.messages.add_reader(message_id, reader).await? {
            message.read_by.insert(reader.clone());
            self.gateway.send_to_room(
                &message.group_id,
                &ServerEvent::GroupMessageRead {
                    message_id,
                    group_id: message.group_id.clone(),
                    user_id: reader.clone(),
                },
                None,
            );
        }
        Ok(message)
    }

    pub async fn add_reaction(
        &self,
        actor: &UserId,
        message_id: MessageId,
        emoji: &str,
    ) -> Result<GroupMessage, AppError> {
        let emoji = emoji.trim();
        if emoji.is_empty() {
            return Err(AppError::Validation("Emoji is required".into()));
        }

        self.message_for_member(actor, message_id).await?;

        let updated = self.messages.set_reaction(message_id, actor, emoji).await?;
        self.broadcast_reactions(&updated);
        Ok(updated)
    }

    pub async fn remove_reaction(
        &self,
        actor: &UserId,
        message_id: MessageId,
    ) -> Result<GroupMessage, AppError> {
        self.message_for_member(actor, message_id).await?;

        let updated = self.messages.remove_reaction(message_id, actor).await?;
        self.broadcast_reactions(&updated);
        Ok(updated)
    }

    pub async fn edit(
        &self,
        actor: &UserId,
        message_id: MessageId,
        text: &str,
    ) -> Result<GroupMessage, AppError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AppError::Validation("Message cannot be empty".into()));
        }

        let (message, _) = self.message_for_member(actor, message_id).await?;
        if &message.sender_id != actor {
            return Err(AppError::Forbidden("Only the author can edit this message".into()));
        }

        let updated = self.messages.update_text(message_id, text).await?;
        self.gateway.send_to_room(
            &updated.group_id,
            &ServerEvent::MessageEdited {
                message_id,
                group_id: Some(updated.group_id.clone()),
                text: text.to_string(),
                is_edited: true,
            },
            None,
        );
        Ok(updated)
    }

    /// Author or group admin may delete.
    pub async fn delete(&self, actor: &UserId, message_id: MessageId) -> Result<(), AppError> {
        let (message, group) = self.message_for_member(actor, message_id).await?;
        if &message.sender_id != actor && !group.is_admin(actor) {
            return Err(AppError::Forbidden(
                "Only the author or the group admin can delete this message".into(),
            ));
        }

        if !self.messages.delete(message_id).await? {
            return Err(AppError::NotFound(format!("Message {}", message_id)));
        }

        tracing::debug!(message_id = %message_id, group_id = %group.id, actor = %actor, "Group message deleted");
        self.gateway.send_to_room(
            &group.id,
            &ServerEvent::MessageDeleted {
                message_id,
                group_id: Some(group.id.clone()),
            },
            None,
        );
        Ok(())
    }

    async fn find_group(&self, group_id: &RoomId) -> Result<Group, AppError> {
        self.groups
            .find_by_id(group_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Group {}", group_id)))
    }

    async fn group_for_admin(&self, actor: &UserId, group_id: &RoomId) -> Result<Group, AppError> {
        let group = self.find_group(group_id).await?;
        if !group.is_admin(actor) {
            return Err(AppError::Forbidden("Only the group admin can do this".into()));
        }
        Ok(group)
    }

    async fn group_for_member(&self, actor: &UserId, group_id: &RoomId) -> Result<Group, AppError> {
        let group = self.find_group(group_id).await?;
        if !group.is_member(actor) {
            return Err(AppError::Forbidden("Not a member of this group".into()));
        }
        Ok(group)
    }

    async fn message_for_member(
        &self,
        actor: &UserId,
        message_id: MessageId,
    ) -> Result<(GroupMessage, Group), AppError> {
        let message = self
            .messages
            .find_by_id(message_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Message {}", message_id)))?;
        let group = self.group_for_member(actor, &message.group_id).await?;
        Ok((message, group))
    }

    fn broadcast_reactions(&self, message: &GroupMessage) {
        self.gateway.send_to_room(
            &message.group_id,
            &ServerEvent::ReactionsChanged {
                message_id: message.id,
                group_id: Some(message.group_id.clone()),
                reactions: message.reactions.clone(),
            },
            None,
        );
    }
}
