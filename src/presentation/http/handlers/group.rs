//! Group Handlers
//!
//! Roster management and group message operations.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};

use super::parse_message_id;
use crate::application::dto::{
    AddMembersRequest, CreateGroupRequest, EditMessageRequest, ReactionRequest,
    SendMessageRequest, UpdateGroupRequest,
};
use crate::domain::{Group, GroupMessage, RoomId, UserId};
use crate::presentation::middleware::AuthUser;
use crate::shared::error::AppError;
use crate::shared::validation::validate_request;
use crate::startup::AppState;

/// Create a group; the caller becomes its admin and a member
pub async fn create_group(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<CreateGroupRequest>,
) -> Result<(StatusCode, Json<Group>), AppError> {
    validate_request(&body)?;

    let group = state
        .group_messages
        .create_group(&auth.user_id, &body.name, &body.description, body.members)
        .await?;

    Ok((StatusCode::CREATED, Json(group)))
}

pub async fn get_group(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(group_id): Path<String>,
) -> Result<Json<Group>, AppError> {
    let group = state
        .group_messages
        .get_group(&auth.user_id, &RoomId::new(group_id))
        .await?;
    Ok(Json(group))
}

/// Groups the caller belongs to, most recently updated first
pub async fn list_user_groups(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> Result<Json<Vec<Group>>, AppError> {
    let groups = state.group_messages.list_user_groups(&auth.user_id).await?;
    Ok(Json(groups))
}

pub async fn update_group(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(group_id): Path<String>,
    Json(body): Json<UpdateGroupRequest>,
) -> Result<Json<Group>, AppError> {
    validate_request(&body)?;

    let group = state
        .group_messages
        .update_group(
            &auth.user_id,
            &RoomId::new(group_id),
            body.name.as_deref(),
            body.description.as_deref(),
        )
        .await?;
    Ok(Json(group))
}

pub async fn add_members(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(group_id): Path<String>,
    Json(body): Json<AddMembersRequest>,
) -> Result<Json<Group>, AppError> {
    validate_request(&body)?;

    let group = state
        .group_messages
        .add_members(&auth.user_id, &RoomId::new(group_id), body.members)
        .await?;
    Ok(Json(group))
}

/// Remove a member (admin), or leave the group (any member removing themselves)
pub async fn remove_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((group_id, member_id)): Path<(String, String)>,
) -> Result<Json<Group>, AppError> {
    let group = state
        .group_messages
        .remove_member(&auth.user_id, &RoomId::new(group_id), &UserId::new(member_id))
        .await?;
    Ok(Json(group))
}

pub async fn delete_group(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(group_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state
        .group_messages
        .delete_group(&auth.user_id, &RoomId::new(group_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn send_group_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(group_id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<GroupMessage>), AppError> {
    validate_request(&body)?;

    let message = state
        .group_messages
        .send(&auth.user_id, &RoomId::new(group_id), body.into_content())
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn list_group_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(group_id): Path<String>,
) -> Result<Json<Vec<GroupMessage>>, AppError> {
    let messages = state
        .group_messages
        .list(&auth.user_id, &RoomId::new(group_id))
        .await?;
    Ok(Json(messages))
}

/// Add the caller to the message's read-by set
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(message_id): Path<String>,
) -> Result<Json<GroupMessage>, AppError> {
    let message_id = parse_message_id(&message_id)?;
    let message = state
        .group_messages
        .mark_read(&auth.user_id, message_id)
        .await?;
    Ok(Json(message))
}

pub async fn add_reaction(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(message_id): Path<String>,
    Json(body): Json<ReactionRequest>,
) -> Result<Json<GroupMessage>, AppError> {
    validate_request(&body)?;
    let message_id = parse_message_id(&message_id)?;
    let message = state
        .group_messages
        .add_reaction(&auth.user_id, message_id, &body.emoji)
        .await?;
    Ok(Json(message))
}

pub async fn remove_reaction(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(message_id): Path<String>,
) -> Result<Json<GroupMessage>, AppError> {
    let message_id = parse_message_id(&message_id)?;
    let message = state
        .group_messages
        .remove_reaction(&auth.user_id, message_id)
        .await?;
    Ok(Json(message))
}

pub async fn edit_group_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(message_id): Path<String>,
    Json(body): Json<EditMessageRequest>,
) -> Result<Json<GroupMessage>, AppError> {
    validate_request(&body)?;
    let message_id = parse_message_id(&message_id)?;
    let message = state
        .group_messages
        .edit(&auth.user_id, message_id, &body.text)
        .await?;
    Ok(Json(message))
}

/// Delete a group message (author or group admin)
pub async fn delete_group_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(message_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let message_id = parse_message_id(&message_id)?;
    state
        .group_messages
        .delete(&auth.user_id, message_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
