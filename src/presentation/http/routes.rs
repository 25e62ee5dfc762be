//! Route Configuration
//!
//! Configures all HTTP routes for the API.

use axum::{
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
    Router,
};

use super::handlers;
use crate::infrastructure::metrics;
use crate::presentation::middleware::auth_middleware;
use crate::presentation::websocket::ws_handler;
use crate::startup::AppState;

/// Create the main API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api", api_routes(state.clone()))
        // The gateway authenticates through its `identify` frame
        .route("/gateway", get(ws_handler))
        .route("/health", get(handlers::health::health_check))
        .route("/health/live", get(handlers::health::liveness))
        .route("/health/ready", get(handlers::health::readiness))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Prometheus metrics endpoint handler
async fn metrics_handler() -> impl IntoResponse {
    (
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        metrics::gather_metrics(),
    )
}

fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/messages", message_routes())
        .nest("/groups", group_routes())
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

/// Direct message routes. `{id}` is the other identity for GET and a
/// message id for PUT/DELETE.
fn message_routes() -> Router<AppState> {
    use handlers::message;

    Router::new()
        .route("/send/{id}", post(message::send_message))
        .route("/forward/{id}", post(message::forward_message))
        .route("/status/{id}", put(message::update_status))
        .route(
            "/{id}",
            get(message::get_conversation)
                .put(message::edit_message)
                .delete(message::delete_message),
        )
        .route(
            "/{id}/reactions",
            post(message::add_reaction).delete(message::remove_reaction),
        )
}

fn group_routes() -> Router<AppState> {
    use handlers::group;

    Router::new()
        .route("/", post(group::create_group).get(group::list_user_groups))
        .route("/messages/{id}/read", put(group::mark_read))
        .route(
            "/messages/{id}/reactions",
            post(group::add_reaction).delete(group::remove_reaction),
        )
        .route(
            "/messages/{id}",
            put(group::edit_group_message).delete(group::delete_group_message),
        )
        .route(
            "/{id}",
            get(group::get_group)
                .put(group::update_group)
                .delete(group::delete_group),
        )
        .route("/{id}/members", post(group::add_members))
        .route("/{id}/members/{member}", delete(group::remove_member))
        .route(
            "/{id}/messages",
            post(group::send_group_message).get(group::list_group_messages),
        )
}
