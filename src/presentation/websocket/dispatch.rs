//! Client Event Dispatch
//!
//! Routes one parsed inbound event from an identified connection to the
//! realtime core. Failures are returned to the caller, which acknowledges
//! them to the requesting connection only.

use crate::realtime::{ClientEvent, Connection, ConnectionManager, ServerEvent};
use crate::shared::error::AppError;

pub async fn dispatch_client_event(
    connections: &ConnectionManager,
    conn: &Connection,
    event: ClientEvent,
) -> Result<(), AppError> {
    let me = &conn.user_id;

    match event {
        ClientEvent::Identify { .. } => Err(AppError::BadRequest("Already identified".into())),

        ClientEvent::Heartbeat => {
            conn.send(ServerEvent::HeartbeatAck);
            Ok(())
        }

        ClientEvent::JoinRoom { room_id } => connections.join_room(me, &room_id).await,

        ClientEvent::LeaveRoom { room_id } => {
            connections.leave_room(me, &room_id);
            Ok(())
        }

        ClientEvent::Typing {
            to,
            room_id,
            is_typing,
        } => {
            let gateway = connections.gateway();
            match (to, room_id) {
                (Some(to), None) => {
                    gateway.send_to_identity(
                        &to,
                        &ServerEvent::Typing {
                            from: me.clone(),
                            room_id: None,
                            is_typing,
                        },
                    );
                    Ok(())
                }
                (None, Some(room_id)) => {
                    if !gateway.membership().is_joined(&room_id, me) {
                        return Err(AppError::Forbidden("Join the room first".into()));
                    }
                    let event = ServerEvent::Typing {
                        from: me.clone(),
                        room_id: Some(room_id.clone()),
                        is_typing,
                    };
                    gateway.send_to_room(&room_id, &event, Some(me));
                    Ok(())
                }
                _ => Err(AppError::Validation(
                    "typing needs exactly one of `to` or `roomId`".into(),
                )),
            }
        }

        ClientEvent::RequestCall { to, call_kind } => connections.calls().call(conn, &to, call_kind),
        ClientEvent::AnswerCall { to, signal } => connections.calls().answer(conn, &to, signal),
        ClientEvent::RelaySignal { to, signal } => {
            connections.calls().relay_signal(me, &to, signal)
        }
        ClientEvent::RejectCall { to } => connections.calls().reject(me, &to),
        ClientEvent::EndCall { to } => connections.calls().end(me, &to),
    }
}
