//! HTTP Handlers
//!
//! Request handlers for all HTTP endpoints.

pub mod group;
pub mod health;
pub mod message;

use crate::domain::MessageId;
use crate::shared::error::AppError;

/// Parse a message id path segment.
pub(crate) fn parse_message_id(raw: &str) -> Result<MessageId, AppError> {
    MessageId::parse(raw).ok_or_else(|| AppError::BadRequest("Invalid message ID".into()))
}
