//! In-memory store
//!
//! Process-local implementation of every repository trait. Backs the
//! `memory` store backend and the test suites.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::domain::{
    DirectMessage, Group, GroupMessage, GroupMessageRepository, GroupRepository, MessageId,
    MessageRepository, MessageStatus, Reactions, RoomId, StatusChange, StatusWrite, UserId,
};
use crate::shared::error::AppError;

#[derive(Debug, Default)]
pub struct InMemoryStore {
    messages: RwLock<HashMap<MessageId, DirectMessage>>,
    groups: RwLock<HashMap<RoomId, Group>>,
    group_messages: RwLock<HashMap<MessageId, GroupMessage>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn message_not_found(id: MessageId) -> AppError {
    AppError::NotFound(format!("Message {}", id))
}

fn group_not_found(id: &RoomId) -> AppError {
    AppError::NotFound(format!("Group {}", id))
}

/// Apply `f` to the stored record under the write lock and return the
/// updated copy. `f` must not mutate before it fails.
fn modify<T: Clone>(
    map: &RwLock<HashMap<MessageId, T>>,
    id: MessageId,
    f: impl FnOnce(&mut T) -> Result<(), AppError>,
) -> Result<T, AppError> {
    let mut map = map.write();
    let record = map.get_mut(&id).ok_or_else(|| message_not_found(id))?;
    f(record)?;
    Ok(record.clone())
}

/// Forward-only status write on a record that is already locked.
fn advance(
    status: &mut MessageStatus,
    updated_at: &mut DateTime<Utc>,
    next: MessageStatus,
) -> StatusChange {
    if next <= *status {
        return StatusChange::Unchanged;
    }
    *status = next;
    *updated_at = Utc::now();
    StatusChange::Advanced
}

fn drop_reaction(
    reactions: &mut Reactions,
    updated_at: &mut DateTime<Utc>,
    user_id: &UserId,
) -> Result<(), AppError> {
    reactions.remove(user_id).ok_or(AppError::NoReaction)?;
    *updated_at = Utc::now();
    Ok(())
}

#[async_trait]
impl MessageRepository for InMemoryStore {
    async fn find_by_id(&self, id: MessageId) -> Result<Option<DirectMessage>, AppError> {
        Ok(self.messages.read().get(&id).cloned())
    }

    async fn find_conversation(
        &self,
        user_a: &UserId,
        user_b: &UserId,
    ) -> Result<Vec<DirectMessage>, AppError> {
        let mut conversation: Vec<DirectMessage> = self
            .messages
            .read()
            .values()
            .filter(|m| {
                (&m.sender_id == user_a && &m.receiver_id == user_b)
                    || (&m.sender_id == user_b && &m.receiver_id == user_a)
            })
            .cloned()
            .collect();
        conversation.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(conversation)
    }

    async fn create(&self, message: &DirectMessage) -> Result<DirectMessage, AppError> {
        self.messages.write().insert(message.id, message.clone());
        Ok(message.clone())
    }

    async fn advance_status(
        &self,
        id: MessageId,
        status: MessageStatus,
    ) -> Result<StatusWrite<DirectMessage>, AppError> {
        let mut messages = self.messages.write();
        let message = messages.get_mut(&id).ok_or_else(|| message_not_found(id))?;
        let change = advance(&mut message.status, &mut message.updated_at, status);
        Ok(StatusWrite {
            record: message.clone(),
            change,
        })
    }

    async fn mark_read(&self, ids: &[MessageId]) -> Result<Vec<MessageId>, AppError> {
        let mut messages = self.messages.write();
        let mut changed = Vec::new();
        for id in ids {
            if let Some(m) = messages.get_mut(id) {
                if advance(&mut m.status, &mut m.updated_at, MessageStatus::Read)
                    == StatusChange::Advanced
                {
                    changed.push(*id);
                }
            }
        }
        Ok(changed)
    }

    async fn set_reaction(
        &self,
        id: MessageId,
        user_id: &UserId,
        emoji: &str,
    ) -> Result<DirectMessage, AppError> {
        modify(&self.messages, id, |m| {
            m.reactions.set(user_id, emoji);
            m.updated_at = Utc::now();
            Ok(())
        })
    }

    async fn remove_reaction(
        &self,
        id: MessageId,
        user_id: &UserId,
    ) -> Result<DirectMessage, AppError> {
        modify(&self.messages, id, |m| {
            drop_reaction(&mut m.reactions, &mut m.updated_at, user_id)
        })
    }

    async fn update_text(&self, id: MessageId, text: &str) -> Result<DirectMessage, AppError> {
        modify(&self.messages, id, |m| {
            m.text = Some(text.to_string());
            m.is_edited = true;
            m.updated_at = Utc::now();
            Ok(())
        })
    }

    async fn delete(&self, id: MessageId) -> Result<bool, AppError> {
        Ok(self.messages.write().remove(&id).is_some())
    }
}

impl InMemoryStore {
    fn modify_group(
        &self,
        id: &RoomId,
        f: impl FnOnce(&mut Group),
    ) -> Result<Group, AppError> {
        let mut groups = self.groups.write();
        let group = groups.get_mut(id).ok_or_else(|| group_not_found(id))?;
        f(group);
        group.updated_at = Utc::now();
        Ok(group.clone())
    }
}

#[async_trait]
impl GroupRepository for InMemoryStore {
    async fn find_by_id(&self, id: &RoomId) -> Result<Option<Group>, AppError> {
        Ok(self.groups.read().get(id).cloned())
    }

    async fn list_members(&self, id: &RoomId) -> Result<Vec<UserId>, AppError> {
        Ok(self
            .groups
            .read()
            .get(id)
            .map(|g| g.members.clone())
            .unwrap_or_default())
    }

    async fn create(&self, group: &Group) -> Result<Group, AppError> {
        self.groups.write().insert(group.id.clone(), group.clone());
        Ok(group.clone())
    }

    async fn list_for_member(&self, user_id: &UserId) -> Result<Vec<Group>, AppError> {
        let mut groups: Vec<Group> = self
            .groups
            .read()
            .values()
            .filter(|g| g.is_member(user_id))
            .cloned()
            .collect();
        groups.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(groups)
    }

    async fn update_details(
        &self,
        id: &RoomId,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Group, AppError> {
        self.modify_group(id, |g| {
            if let Some(name) = name {
                g.name = name.to_string();
            }
            if let Some(description) = description {
                g.description = description.to_string();
            }
        })
    }

    async fn add_members(&self, id: &RoomId, members: &[UserId]) -> Result<Group, AppError> {
        self.modify_group(id, |g| {
            for member in members {
                if !g.members.contains(member) {
                    g.members.push(member.clone());
                }
            }
        })
    }

    async fn remove_member(&self, id: &RoomId, member: &UserId) -> Result<Group, AppError> {
        self.modify_group(id, |g| g.members.retain(|m| m != member))
    }

    async fn delete(&self, id: &RoomId) -> Result<bool, AppError> {
        let removed = self.groups.write().remove(id).is_some();
        if removed {
            self.group_messages.write().retain(|_, m| &m.group_id != id);
        }
        Ok(removed)
    }
}

#[async_trait]
impl GroupMessageRepository for InMemoryStore {
    async fn find_by_id(&self, id: MessageId) -> Result<Option<GroupMessage>, AppError> {
        Ok(self.group_messages.read().get(&id).cloned())
    }

    async fn find_by_group(&self, group_id: &RoomId) -> Result<Vec<GroupMessage>, AppError> {
        let mut messages: Vec<GroupMessage> = self
            .group_messages
            .read()
            .values()
            .filter(|m| &m.group_id == group_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(messages)
    }

    async fn create(&self, message: &GroupMessage) -> Result<GroupMessage, AppError> {
        self.group_messages
            .write()
            .insert(message.id, message.clone());
        Ok(message.clone())
    }

    async fn advance_status(
        &self,
        id: MessageId,
        status: MessageStatus,
    ) -> Result<StatusWrite<GroupMessage>, AppError> {
        GroupMessage::check_status(status)?;
        let mut messages = self.group_messages.write();
        let message = messages.get_mut(&id).ok_or_else(|| message_not_found(id))?;
        let change = advance(&mut message.status, &mut message.updated_at, status);
        Ok(StatusWrite {
            record: message.clone(),
            change,
        })
    }

    async fn add_reader(&self, id: MessageId, reader: &UserId) -> Result<bool, AppError> {
        let mut messages = self.group_messages.write();
        let message = messages.get_mut(&id).ok_or_else(|| message_not_found(id))?;
        Ok(message.read_by.insert(reader.clone()))
    }

    async fn set_reaction(
        &self,
        id: MessageId,
        user_id: &UserId,
        emoji: &str,
    ) -> Result<GroupMessage, AppError> {
        modify(&self.group_messages, id, |m| {
            m.reactions.set(user_id, emoji);
            m.updated_at = Utc::now();
            Ok(())
        })
    }

    async fn remove_reaction(
        &self,
        id: MessageId,
        user_id: &UserId,
    ) -> Result<GroupMessage, AppError> {
        modify(&self.group_messages, id, |m| {
            drop_reaction(&mut m.reactions, &mut m.updated_at, user_id)
        })
    }

    async fn update_text(&self, id: MessageId, text: &str) -> Result<GroupMessage, AppError> {
        modify(&self.group_messages, id, |m| {
            m.text = Some(text.to_string());
            m.is_edited = true;
            m.updated_at = Utc::now();
            Ok(())
        })
    }

    async fn delete(&self, id: MessageId) -> Result<bool, AppError> {
        Ok(self.group_messages.write().remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MessageContent;

    fn text(s: &str) -> MessageContent {
        MessageContent {
            text: Some(s.into()),
            attachment: None,
        }
    }

    #[tokio::test]
    async fn test_conversation_is_symmetric_and_ordered() {
        let store = InMemoryStore::new();
        let (a, b, c) = (UserId::new("a"), UserId::new("b"), UserId::new("c"));
        let first = DirectMessage::new(a.clone(), b.clone(), text("one"));
        let second = DirectMessage::new(b.clone(), a.clone(), text("two"));
        let other = DirectMessage::new(a.clone(), c.clone(), text("elsewhere"));
        for m in [&first, &second, &other] {
            MessageRepository::create(&store, m).await.unwrap();
        }

        let conversation = store.find_conversation(&b, &a).await.unwrap();
        let ids: Vec<MessageId> = conversation.iter().map(|m| m.id).collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&first.id) && ids.contains(&second.id));
        assert!(conversation[0].created_at <= conversation[1].created_at);
    }

    #[tokio::test]
    async fn test_update_missing_message_is_not_found() {
        let store = InMemoryStore::new();
        let result = MessageRepository::update_text(&store, MessageId::new(), "x").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_add_reader_reports_first_insertion_only() {
        let store = InMemoryStore::new();
        let msg = GroupMessage::new(RoomId::new("g"), UserId::new("a"), text("hi"));
        GroupMessageRepository::create(&store, &msg).await.unwrap();

        assert!(store.add_reader(msg.id, &UserId::new("b")).await.unwrap());
        assert!(!store.add_reader(msg.id, &UserId::new("b")).await.unwrap());
    }

    #[tokio::test]
    async fn test_status_never_moves_backward() {
        let store = InMemoryStore::new();
        let msg = DirectMessage::new(UserId::new("a"), UserId::new("b"), text("hi"));
        MessageRepository::create(&store, &msg).await.unwrap();

        assert_eq!(store.mark_read(&[msg.id]).await.unwrap(), vec![msg.id]);
        let write = MessageRepository::advance_status(&store, msg.id, MessageStatus::Delivered)
            .await
            .unwrap();

        assert!(!write.advanced());
        assert_eq!(write.record.status, MessageStatus::Read);
    }

    #[tokio::test]
    async fn test_mark_read_returns_only_changed_ids() {
        let store = InMemoryStore::new();
        let (a, b) = (UserId::new("a"), UserId::new("b"));
        let first = DirectMessage::new(a.clone(), b.clone(), text("one"));
        let second = DirectMessage::new(a.clone(), b.clone(), text("two"));
        for m in [&first, &second] {
            MessageRepository::create(&store, m).await.unwrap();
        }

        assert_eq!(store.mark_read(&[first.id]).await.unwrap(), vec![first.id]);
        let changed = store.mark_read(&[first.id, second.id]).await.unwrap();
        assert_eq!(changed, vec![second.id]);
        assert!(store.mark_read(&[first.id, second.id]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reactions_from_two_identities_both_survive() {
        let store = InMemoryStore::new();
        let msg = DirectMessage::new(UserId::new("a"), UserId::new("b"), text("hi"));
        MessageRepository::create(&store, &msg).await.unwrap();

        MessageRepository::set_reaction(&store, msg.id, &UserId::new("a"), "👍")
            .await
            .unwrap();
        let stored = MessageRepository::set_reaction(&store, msg.id, &UserId::new("b"), "🎉")
            .await
            .unwrap();
        assert_eq!(stored.reactions.len(), 2);

        let stored = MessageRepository::remove_reaction(&store, msg.id, &UserId::new("a"))
            .await
            .unwrap();
        assert_eq!(stored.reactions.len(), 1);
        assert!(matches!(
            MessageRepository::remove_reaction(&store, msg.id, &UserId::new("a")).await,
            Err(AppError::NoReaction)
        ));
    }

    #[tokio::test]
    async fn test_deleting_group_drops_its_messages() {
        let store = InMemoryStore::new();
        let group = Group::new("crew".into(), String::new(), UserId::new("a"), vec![]);
        GroupRepository::create(&store, &group).await.unwrap();
        let msg = GroupMessage::new(group.id.clone(), UserId::new("a"), text("hi"));
        GroupMessageRepository::create(&store, &msg).await.unwrap();

        assert!(GroupRepository::delete(&store, &group.id).await.unwrap());
        assert!(GroupMessageRepository::find_by_id(&store, msg.id)
            .await
            .unwrap()
            .is_none());
        assert!(!GroupRepository::delete(&store, &group.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_roster_updates_keep_members_unique() {
        let store = InMemoryStore::new();
        let group = Group::new("crew".into(), String::new(), UserId::new("a"), vec![]);
        GroupRepository::create(&store, &group).await.unwrap();

        let updated = store
            .add_members(&group.id, &[UserId::new("b"), UserId::new("a"), UserId::new("b")])
            .await
            .unwrap();
        assert_eq!(updated.members, vec![UserId::new("a"), UserId::new("b")]);

        let updated = store.remove_member(&group.id, &UserId::new("b")).await.unwrap();
        assert_eq!(updated.members, vec![UserId::new("a")]);
        assert_eq!(store.list_for_member(&UserId::new("b")).await.unwrap().len(), 0);
    }
}
