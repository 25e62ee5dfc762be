//! Message Repository Implementation
//!
//! PostgreSQL implementation of direct message storage. Reactions and the
//! attachment reference are stored as JSONB on the message row.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{
    Attachment, DirectMessage, MessageId, MessageRepository, MessageStatus, Reaction, Reactions,
    StatusChange, StatusWrite, UserId,
};
use crate::shared::error::AppError;

/// PostgreSQL direct message repository.
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Internal row type for message queries.
/// Maps to the messages table schema defined in the migration.
#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    sender_id: String,
    receiver_id: String,
    text: Option<String>,
    attachment: Option<Json<Attachment>>,
    status: String,
    is_edited: bool,
    reactions: Json<Vec<Reaction>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for DirectMessage {
    type Error = AppError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let status = MessageStatus::parse(&row.status).ok_or_else(|| {
            AppError::Internal(format!("unknown message status '{}'", row.status))
        })?;
        Ok(DirectMessage {
            id: MessageId::from_uuid(row.id),
            sender_id: UserId::new(row.sender_id),
            receiver_id: UserId::new(row.receiver_id),
            text: row.text,
            attachment: row.attachment.map(|a| a.0),
            status,
            is_edited: row.is_edited,
            reactions: Reactions::from(row.reactions.0),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn not_found(id: MessageId) -> AppError {
    AppError::NotFound(format!("Message {}", id))
}

/// Map the row returned by an `UPDATE ... RETURNING`; no row means the
/// message does not exist (or was deleted).
fn updated(row: Option<MessageRow>, id: MessageId) -> Result<DirectMessage, AppError> {
    row.ok_or_else(|| not_found(id))?.try_into()
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    async fn find_by_id(&self, id: MessageId) -> Result<Option<DirectMessage>, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, sender_id, receiver_id, text, attachment, status,
                   is_edited, reactions, created_at, updated_at
            FROM messages
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(DirectMessage::try_from).transpose()
    }

    /// Both directions of the conversation, oldest first.
    async fn find_conversation(
        &self,
        user_a: &UserId,
        user_b: &UserId,
    ) -> Result<Vec<DirectMessage>, AppError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, sender_id, receiver_id, text, attachment, status,
                   is_edited, reactions, created_at, updated_at
            FROM messages
            WHERE (sender_id = $1 AND receiver_id = $2)
               OR (sender_id = $2 AND receiver_id = $1)
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(user_a.as_str())
        .bind(user_b.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(DirectMessage::try_from).collect()
    }

    async fn create(&self, message: &DirectMessage) -> Result<DirectMessage, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            INSERT INTO messages (id, sender_id, receiver_id, text, attachment, status,
                                  is_edited, reactions, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id, sender_id, receiver_id, text, attachment, status,
                      is_edited, reactions, created_at, updated_at
            "#,
        )
        .bind(message.id.as_uuid())
        .bind(message.sender_id.as_str())
        .bind(message.receiver_id.as_str())
        .bind(&message.text)
        .bind(message.attachment.as_ref().map(Json))
        .bind(message.status.as_str())
        .bind(message.is_edited)
        .bind(Json(message.reactions.iter().cloned().collect::<Vec<_>>()))
        .bind(message.created_at)
        .bind(message.updated_at)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    /// Conditional on the stored rank so a late write can never move the
    /// status backward. No row back means either nothing to advance or no
    /// such message.
    async fn advance_status(
        &self,
        id: MessageId,
        status: MessageStatus,
    ) -> Result<StatusWrite<DirectMessage>, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            UPDATE messages
            SET status = $2, updated_at = NOW()
            WHERE id = $1
              AND (CASE status WHEN 'sent' THEN 0 WHEN 'delivered' THEN 1 ELSE 2 END) < $3
            RETURNING id, sender_id, receiver_id, text, attachment, status,
                      is_edited, reactions, created_at, updated_at
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

    /// Bulk read in a single statement.
    async fn mark_read(&self, ids: &[MessageId]) -> Result<Vec<MessageId>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = ids.iter().map(MessageId::as_uuid).collect();

        let changed = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE messages
            SET status = 'read', updated_at = NOW()
            WHERE id = ANY($1) AND status <> 'read'
            RETURNING id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(changed.into_iter().map(MessageId::from_uuid).collect())
    }

    /// Rewrites the JSONB array in place: the identity's old entry is
    /// filtered out and the new one appended, all under the row lock.
    async fn set_reaction(
        &self,
        id: MessageId,
        user_id: &UserId,
        emoji: &str,
    ) -> Result<DirectMessage, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            UPDATE messages
            SET reactions = (
                    SELECT COALESCE(jsonb_agg(r ORDER BY n), '[]'::jsonb)
                    FROM jsonb_array_elements(reactions) WITH ORDINALITY AS e(r, n)
                    WHERE r->>'userId' <> $2
                ) || jsonb_build_array(jsonb_build_object('userId', $2::text, 'emoji', $3::text)),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, sender_id, receiver_id, text, attachment, status,
                      is_edited, reactions, created_at, updated_at
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
    ) -> Result<DirectMessage, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            UPDATE messages
            SET reactions = (
                    SELECT COALESCE(jsonb_agg(r ORDER BY n), '[]'::jsonb)
                    FROM jsonb_array_elements(reactions) WITH ORDINALITY AS e(r, n)
                    WHERE r->>'userId' <> $2
                ),
                updated_at = NOW()
            WHERE id = $1
              AND reactions @> jsonb_build_array(jsonb_build_object('userId', $2::text))
            RETURNING id, sender_id, receiver_id, text, attachment, status,
                      is_edited, reactions, created_at, updated_at
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

    async fn update_text(&self, id: MessageId, text: &str) -> Result<DirectMessage, AppError> {
        let row = sqlx::query_as::<_, MessageRow>(
            r#"
            UPDATE messages
            SET text = $2, is_edited = TRUE, updated_at = NOW()
            WHERE id = $1
            RETURNING id, sender_id, receiver_id, text, attachment, status,
                      is_edited, reactions, created_at, updated_at
            "#,
        )
        .bind(id.as_uuid())
        .bind(text)
        .fetch_optional(&self.pool)
        .await?;

        updated(row, id)
    }

    /// Permanent delete; there is no soft-delete column.
    async fn delete(&self, id: MessageId) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
