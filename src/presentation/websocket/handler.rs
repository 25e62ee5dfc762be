//! WebSocket Connection Handler
//!
//! Drives one connection through `Connecting -> Connected -> Disconnected`.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, MissedTickBehavior};

use super::dispatch::dispatch_client_event;
use super::session::SessionState;
use crate::domain::UserId;
use crate::presentation::middleware::decode_identity_token;
use crate::realtime::{ClientEvent, Connection, ServerEvent};
use crate::shared::error::AppError;
use crate::startup::AppState;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let max_message_size = state.settings.websocket.max_message_size;
    let max_frame_size = state.settings.websocket.max_frame_size;
    ws.max_message_size(max_message_size)
        .max_frame_size(max_frame_size)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let mut session = SessionState::new();
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();

    // Single writer per connection; everything else goes through `tx`.
    let sender_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let text = match serde_json::to_string(&event) {
                Ok(t) => t,
                Err(e) => {
                    tracing::error!(event = event.name(), "Failed to serialize event: {}", e);
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
            if matches!(event, ServerEvent::InvalidSession { .. }) {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
        }
    });

    let ws_settings = &state.settings.websocket;
    let identified = timeout(
        ws_settings.identify_timeout(),
        await_identify(&mut stream, &state.settings.jwt.secret),
    )
    .await;

    let user_id = match identified {
        Ok(Ok(user_id)) => user_id,
        Ok(Err(reason)) => {
            tracing::debug!(reason = %reason, "Identify failed");
            close_with_invalid_session(&tx, reason, sender_task).await;
            return;
        }
        Err(_) => {
            tracing::debug!("Identify timeout");
            close_with_invalid_session(&tx, "Identify timeout".into(), sender_task).await;
            return;
        }
    };

    let conn = state.connections.connect(user_id, tx.clone());
    session.mark_connected();

    let deadline = ws_settings.heartbeat_deadline();
    let mut heartbeat_check = interval(deadline);
    heartbeat_check.set_missed_tick_behavior(MissedTickBehavior::Delay);
    heartbeat_check.tick().await;

    loop {
        tokio::select! {
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_frame(&state, &conn, &mut session, text.as_str()).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!(connection_id = %conn.id, "Connection closed by peer");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::debug!(connection_id = %conn.id, error = %e, "WebSocket error");
                        break;
                    }
                    // Pings are answered by axum; binary frames are ignored.
                    Some(Ok(_)) => {}
                }
            }

            _ = heartbeat_check.tick() => {
                if !session.is_alive(deadline) {
                    tracing::info!(
                        user_id = %conn.user_id,
                        connection_id = %conn.id,
                        "Heartbeat timeout, closing connection"
                    );
                    break;
                }
            }
        }
    }

    if session.mark_disconnected() {
        state.connections.disconnect(&conn);
    }
    sender_task.abort();
}

/// Wait for the first `identify` frame and verify its token. Any other
/// frame before it is ignored.
async fn await_identify<S>(stream: &mut S, secret: &str) -> Result<UserId, String>
where
    S: futures::Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Ok(ClientEvent::Identify { token }) =
                    serde_json::from_str::<ClientEvent>(text.as_str())
                {
                    return decode_identity_token(&token, secret).map_err(|e| e.public_message());
                }
            }
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        }
    }
    Err("Connection closed before identify".into())
}

async fn close_with_invalid_session(
    tx: &mpsc::UnboundedSender<ServerEvent>,
    reason: String,
    sender_task: tokio::task::JoinHandle<()>,
) {
    if tx.send(ServerEvent::InvalidSession { reason }).is_ok() {
        // Let the writer flush the frame and the close.
        let _ = timeout(std::time::Duration::from_millis(500), sender_task).await;
    } else {
        sender_task.abort();
    }
}

async fn handle_frame(
    state: &AppState,
    conn: &Arc<Connection>,
    session: &mut SessionState,
    text: &str,
) {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            let err = AppError::BadRequest(format!("Malformed event: {}", e));
            state
                .gateway
                .send_to_connection(conn.id, ServerEvent::error(None, &err));
            return;
        }
    };

    if matches!(event, ClientEvent::Heartbeat) {
        session.heartbeat();
    }

    let name = event.name();
    if let Err(e) = dispatch_client_event(&state.connections, conn, event).await {
        tracing::debug!(
            user_id = %conn.user_id,
            connection_id = %conn.id,
            request = name,
            error = %e,
            "Request failed"
        );
        state
            .gateway
            .send_to_connection(conn.id, ServerEvent::error(Some(name), &e));
    }
}
