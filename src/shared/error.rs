//! Application Error Types
//!
//! Centralized error taxonomy shared by the HTTP handlers, the message
//! services and the realtime gateway, with Axum integration.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("No reaction to remove")]
    NoReaction,

    #[error("User is offline: {0}")]
    UserOffline(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Transient error: {0}")]
    Transient(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AppError {
    /// Stable machine-readable code, also used in WebSocket error events.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::InvalidTransition(_) => "INVALID_TRANSITION",
            AppError::NoReaction => "NO_REACTION",
            AppError::UserOffline(_) => "USER_OFFLINE",
            AppError::Validation(_) => "VALIDATION",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Transient(_) | AppError::Database(_) => "TRANSIENT",
            AppError::Internal(_) => "INTERNAL",
        }
    }

    /// HTTP status matching the error kind.
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::InvalidTransition(_) | AppError::NoReaction => StatusCode::CONFLICT,
            AppError::UserOffline(_) => StatusCode::CONFLICT,
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Transient(_) | AppError::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show to the requester. Store and internal failures
    /// are logged and replaced by a generic text.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Transient(msg) => {
                tracing::warn!("Transient store error: {}", msg);
                "Temporarily unavailable, try again".into()
            }
            AppError::Database(e) => {
                tracing::warn!("Database error: {}", e);
                "Temporarily unavailable, try again".into()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".into()
            }
            other => other.to_string(),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            code: self.code(),
            message: self.public_message(),
        };

        (self.status(), Json(body)).into_response()
    }
}
