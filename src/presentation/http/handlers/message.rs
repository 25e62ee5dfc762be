//! Direct Message Handlers

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};

use super::parse_message_id;
use crate::application::dto::{
    EditMessageRequest, ForwardMessageRequest, ReactionRequest, SendMessageRequest,
    UpdateStatusRequest,
};
use crate::domain::{DirectMessage, UserId};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::validate_request;
use crate::startup::AppState;

/// Conversation with another identity, oldest first. Reading it marks
/// every unread incoming message as read.
pub async fn get_conversation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(other): Path<String>,
) -> Result<Json<Vec<DirectMessage>>, AppError> {
    let messages = state
        .messages
        .get_conversation(&auth.user_id, &UserId::new(other))
        .await?;
    Ok(Json(messages))
}

/// Send a direct message
pub async fn send_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(receiver): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<DirectMessage>), AppError> {
    validate_request(&body)?;

    let message = state
        .messages
        .send_message(&auth.user_id, &UserId::new(receiver), body.into_content())
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// Forward an existing message to another identity
pub async fn forward_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(message_id): Path<String>,
    Json(body): Json<ForwardMessageRequest>,
) -> Result<(StatusCode, Json<DirectMessage>), AppError> {
    validate_request(&body)?;
    let message_id = parse_message_id(&message_id)?;

    let message = state
        .messages
        .forward_message(&auth.user_id, message_id, &body.recipient())
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// Explicit `delivered`/`read` update by the receiver
pub async fn update_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(message_id): Path<String>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<DirectMessage>, AppError> {
    let message_id = parse_message_id(&message_id)?;
    let message = state
        .messages
        .update_status(&auth.user_id, message_id, body.status)
        .await?;
    Ok(Json(message))
}

pub async fn add_reaction(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(message_id): Path<String>,
    Json(body): Json<ReactionRequest>,
) -> Result<Json<DirectMessage>, AppError> {
    validate_request(&body)?;
    let message_id = parse_message_id(&message_id)?;
    let message = state
        .messages
        .add_reaction(&auth.user_id, message_id, &body.emoji)
        .await?;
    Ok(Json(message))
}

pub async fn remove_reaction(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(message_id): Path<String>,
) -> Result<Json<DirectMessage>, AppError> {
    let message_id = parse_message_id(&message_id)?;
    let message = state
        .messages
        .remove_reaction(&auth.user_id, message_id)
        .await?;
    Ok(Json(message))
}

/// Edit message text (author only)
pub async fn edit_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(message_id): Path<String>,
    Json(body): Json<EditMessageRequest>,
) -> Result<Json<DirectMessage>, AppError> {
    validate_request(&body)?;
    let message_id = parse_message_id(&message_id)?;
    let message = state
        .messages
        .edit_message(&auth.user_id, message_id, &body.text)
        .await?;
    Ok(Json(message))
}

/// Delete message (author only)
pub async fn delete_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(message_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let message_id = parse_message_id(&message_id)?;
    state
        .messages
        .delete_message(&auth.user_id, message_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
