//! Group Repository Implementation
//!
//! PostgreSQL storage for group rosters and group messages. Rosters and
//! read-by sets are `TEXT[]` columns.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{
    Attachment, Group, GroupMessage, GroupMessageRepository, GroupRepository, MessageId,
    MessageStatus, Reaction, Reactions, RoomId, StatusChange, StatusWrite, UserId,
};
use crate::shared::error::AppError;

pub struct PgGroupRepository {
    pool: PgPool,
}

impl PgGroupRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct GroupRow {
    id: String,
    name: String,
    description: String,
    admin_id: String,
    members: Vec<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<GroupRow> for Group {
    fn from(row: GroupRow) -> Self {
        Group {
            id: RoomId::new(row.id),
            name: row.name,
            description: row.description,
            admin_id: UserId::new(row.admin_id),
            members: row.members.into_iter().map(UserId::new).collect(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl GroupRepository for PgGroupRepository {
    async fn find_by_id(&self, id: &RoomId) -> Result<Option<Group>, AppError> {
        let row = sqlx::query_as::<_, GroupRow>(
            r#"
            SELECT id, name, description, admin_id, members, created_at, updated_at
            FROM groups
            WHERE id = $1
            "#,
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Group::from))
    }

    async fn list_members(&self, id: &RoomId) -> Result<Vec<UserId>, AppError> {
        let members = sqlx::query_scalar::<_, Vec<String>>("SELECT members FROM groups WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        Ok(members
            .unwrap_or_default()
            .into_iter()
            .map(UserId::new)
            .collect())
    }

    async fn create(&self, group: &Group) -> Result<Group, AppError> {
        let members: Vec<String> = group.members.iter().map(UserId::to_string).collect();

        let row = sqlx::query_as::<_, GroupRow>(
            r#"
            INSERT INTO groups (id, name, description, admin_id, members, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, name, description, admin_id, members, created_at, updated_at
            "#,
        )
        .bind(group.id.as_str())
        .bind(&group.name)
        .bind(&group.description)
        .bind(group.admin_id.as_str())
        .bind(&members)
        .bind(group.created_at)
        .bind(group.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn list_for_member(&self, user_id: &UserId) -> Result<Vec<Group>, AppError> {
        let rows = sqlx::query_as::<_, GroupRow>(
            r#"
            SELECT id, name, description, admin_id, members, created_at, updated_at
            FROM groups
            WHERE $1 = ANY(members)
            ORDER BY updated_at DESC
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Group::from).collect())
    }

    async fn update_details(
        &self,
        id: &RoomId,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Group, AppError> {
        let row = sqlx::query_as::<_, GroupRow>(
            r#"
            UPDATE groups
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, admin_id, members, created_at, updated_at
            "#,
        )
        .bind(id.as_str())
        .bind(name)
        .bind(description)
        .fetch_optional(&self.pool)
        .await?;

        group_updated(row, id)
    }

    /// Set union in SQL so concurrent additions do not overwrite each other.
    async fn add_members(&self, id: &RoomId, members: &[UserId]) -> Result<Group, AppError> {
        let members: Vec<String> = members.iter().map(UserId::to_string).collect();

        let row = sqlx::query_as::<_, GroupRow>(
            r#"
            UPDATE groups
            SET members = members || ARRAY(
                    SELECT DISTINCT m FROM unnest($2::text[]) AS m
                    WHERE NOT (m = ANY(members))
                ),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, admin_id, members, created_at, updated_at
            "#,
        )
        .bind(id.as_str())
        .bind(&members)
        .fetch_optional(&self.pool)
        .await?;

        group_updated(row, id)
    }

    async fn remove_member(&self, id: &RoomId, member: &UserId) -> Result<Group, AppError> {
        let row = sqlx::query_as::<_, GroupRow>(
            r#"
            UPDATE groups
            SET members = array_remove(members, $2), updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, description, admin_id, members, created_at, updated_at
            "#,
        )
        .bind(id.as_str())
        .bind(member.as_str())
        .fetch_optional(&self.pool)
        .await?;

        group_updated(row, id)
    }

    /// Messages go with the group through `ON DELETE CASCADE`.
    async fn delete(&self, id: &RoomId) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM groups WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn group_updated(row: Option<GroupRow>, id: &RoomId) -> Result<Group, AppError> {
    row.map(Group::from)
        .ok_or_else(|| AppError::NotFound(format!("Group {}", id)))
}

pub struct PgGroupMessageRepository {
    pool: PgPool,
}

impl PgGroupMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct GroupMessageRow {
    id: Uuid,
    group_id: String,
    sender_id: String,
    text: Option<String>,
    attachment: Option<Json<Attachment>>,
    status: String,
    is_edited: bool,
    read_by: Vec<String>,
    reactions: Json<Vec<Reaction>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<GroupMessageRow> for GroupMessage {
    type Error = AppError;

    fn try_from(row: GroupMessageRow) -> Result<Self, Self::Error> {
        let status = MessageStatus::parse(&row.status).ok_or_else(|| {
            AppError::Internal(format!("unknown message status '{}'", row.status))
        })?;
        Ok(GroupMessage {
            id: MessageId::from_uuid(row.id),
            group_id: RoomId::new(row.group_id),
            sender_id: UserId::new(row.sender_id),
            text: row.text,
            attachment: row.attachment.map(|a| a.0),
            status,
            is_edited: row.is_edited,
            read_by: row.read_by.into_iter().map(UserId::new).collect::<BTreeSet<_>>(),
            reactions: Reactions::from(row.reactions.0),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn not_found(id: MessageId) -> AppError {
    AppError::NotFound(format!("Message {}", id))
}

fn updated(row: Option<GroupMessageRow>, id: MessageId) -> Result<GroupMessage, AppError> {
    row.ok_or_else(|| not_found(id))?.try_into()
}

#[async_trait]
impl GroupMessageRepository for PgGroupMessageRepository {
    async fn find_by_id(&self, id: MessageId) -> Result<Option<GroupMessage>, AppError> {
        let row = sqlx::query_as::<_, GroupMessageRow>(
            r#"
            SELECT id, group_id, sender_id, text, attachment, status, is_edited,
                   read_by, reactions, created_at, updated_at
            FROM group_messages
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(GroupMessage::try_from).transpose()
    }

    async fn find_by_group(&self, group_id: &RoomId) -> Result<Vec<GroupMessage>, AppError> {
        let rows = sqlx::query_as::<_, GroupMessageRow>(
            r#"
            SELECT id, group_id, sender_id, text, attachment, status, is_edited,
                   read_by, reactions, created_at, updated_at
            FROM group_messages
            WHERE group_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(group_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(GroupMessage::try_from).collect()
    }

    async fn create(&self, message: &GroupMessage) -> Result<GroupMessage, AppError> {
        let read_by: Vec<String> = message.read_by.iter().map(UserId::to_string).collect();

        let row = sqlx::query_as::<_, GroupMessageRow>(
            r#"
            INSERT INTO group_messages (id, group_id, sender_id, text, attachment, status,
                                        is_edited, read_by, reactions, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id, group_id, sender_id, text, attachment, status, is_edited,
                      read_by, reactions, created_at, updated_at
            "#,
        )
        .bind(message.id.as_uuid())
        .bind(message.group_id.as_str())
        .bind(message.sender_id.as_str())
        .bind(&message.text)
        .bind(message.attachment.as_ref().map(Json))
        .bind(message.status.as_str())
        .bind(message.is_edited)
        .bind(&read_by)
        .bind(Json(message.reactions.iter().cloned().collect::<Vec<_>>()))
        .bind(message.created_at)
        .bind(message.updated_at)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn advance_status(
        &self,
        id: MessageId,
        status: MessageStatus,
    ) -> Result<StatusWrite<GroupMessage>, AppError> {
        GroupMessage::check_status(status)?;

        let row = sqlx::query_as::<_, GroupMessageRow>(
            r#"
            UPDATE group_messages
            SET status = $2, updated_at = NOW()
            WHERE id = $1
              AND (CASE status WHEN 'sent' THEN 0 WHEN 'delivered' THEN 1 ELSE 2 END) < $3
            RETURNING id, group_id, sender_id, text, attachment, status, is_edited,
                      read_by, reactions, created_at, updated_at
            "#,
        )
        .bind(id.as_uuid())
        .bind(status.as_str())
        .bind(status.rank())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(StatusWrite {
                record: row.try_into()?,
                change: StatusChange::Advanced,
            });
        }

        let current = self.find_by_id(id).await?.ok_or_else(|| not_found(id))?;
        Ok(StatusWrite {
            record: current,
            change: StatusChange::Unchanged,
        })
    }

    /// Append only if absent, so concurrent reads by the same member
    /// report first insertion exactly once.
    async fn add_reader(&self, id: MessageId, reader: &UserId) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE group_messages
            SET read_by = array_append(read_by, $2)
            WHERE id = $1 AND NOT ($2 = ANY(read_by))
            "#,
        )
        .bind(id.as_uuid())
        .bind(reader.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM group_messages WHERE id = $1)",
        )
        .bind(id.as_uuid())
        .fetch_one(&self.pool)
        .await?;

        if exists {
            Ok(false)
        } else {
            Err(not_found(id))
        }
    }

    async fn set_reaction(
        &self,
        id: MessageId,
        user_id: &UserId,
        emoji: &str,
    ) -> Result<GroupMessage, AppError> {
        let row = sqlx::query_as::<_, GroupMessageRow>(
            r#"
            UPDATE group_messages
            SET reactions = (
                    SELECT COALESCE(jsonb_agg(r ORDER BY n), '[]'::jsonb)
                    FROM jsonb_array_elements(reactions) WITH ORDINALITY AS e(r, n)
                    WHERE r->>'userId' <> $2
                ) || jsonb_build_array(jsonb_build_object('userId', $2::text, 'emoji', $3::text)),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, group_id, sender_id, text, attachment, status, is_edited,
                      read_by, reactions, created_at, updated_at
            "#,
        )
        .bind(id.as_uuid())
        .bind(user_id.as_str())
        .bind(emoji)
        .fetch_optional(&self.pool)
        .await?;

        updated(row, id)
    }

    async fn remove_reaction(
        &self,
        id: MessageId,
        user_id: &UserId,
    ) -> Result<GroupMessage, AppError> {
        let row = sqlx::query_as::<_, GroupMessageRow>(
            r#"
            UPDATE group_messages
            SET reactions = (
                    SELECT COALESCE(jsonb_agg(r ORDER BY n), '[]'::jsonb)
                    FROM jsonb_array_elements(reactions) WITH ORDINALITY AS e(r, n)
                    WHERE r->>'userId' <> $2
                ),
                updated_at = NOW()
            WHERE id = $1
              AND reactions @> jsonb_build_array(jsonb_build_object('userId', $2::text))
            RETURNING id, group_id, sender_id, text, attachment, status, is_edited,
                      read_by, reactions, created_at, updated_at
            "#,
        )
        .bind(id.as_uuid())
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => row.try_into(),
            None if self.find_by_id(id).await?.is_some() => Err(AppError::NoReaction),
            None => Err(not_found(id)),
        }
    }

    async fn update_text(&self, id: MessageId, text: &str) -> Result<GroupMessage, AppError> {
        let row = sqlx::query_as::<_, GroupMessageRow>(
            r#"
            UPDATE group_messages
            SET text = $2, is_edited = TRUE, updated_at = NOW()
            WHERE id = $1
            RETURNING id, group_id, sender_id, text, attachment, status, is_edited,
                      read_by, reactions, created_at, updated_at
            "#,
        )
        .bind(id.as_uuid())
        .bind(text)
        .fetch_optional(&self.pool)
        .await?;

        updated(row, id)
    }

    async fn delete(&self, id: MessageId) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM group_messages WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
