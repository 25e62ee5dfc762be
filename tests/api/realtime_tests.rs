//! WebSocket event dispatch tests
//!
//! Drive the dispatcher the connection handler uses, against connections
//! registered on the shared application state.

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;

use chatpulse::domain::{RoomId, UserId};
use chatpulse::presentation::websocket::dispatch_client_event;
use chatpulse::realtime::{CallEndReason, CallKind, ClientEvent, ServerEvent};
use chatpulse::shared::error::AppError;

use crate::common::{TestApp, TestClient};

async fn dispatch(app: &TestApp, client: &TestClient, event: ClientEvent) -> Result<(), AppError> {
    dispatch_client_event(&app.state.connections, &client.conn, event).await
}

fn user(id: &str) -> UserId {
    UserId::new(id)
}

#[tokio::test]
async fn test_presence_follows_first_and_last_device() {
    let app = TestApp::new();
    let mut alice = app.connect("alice");

    let phone = app.connect("bob");
    assert_eq!(
        alice.drain(),
        vec![ServerEvent::PresenceChanged {
            online_identities: vec![user("alice"), user("bob")]
        }]
    );

    let laptop = app.connect("bob");
    app.state.connections.disconnect(&phone.conn);
    assert!(alice.drain().is_empty());

    app.state.connections.disconnect(&laptop.conn);
    assert_eq!(
        alice.drain(),
        vec![ServerEvent::PresenceChanged {
            online_identities: vec![user("alice")]
        }]
    );
}

#[tokio::test]
async fn test_full_call_flow() {
    let app = TestApp::new();
    let mut alice = app.connect("alice");
    let mut bob = app.connect("bob");
    alice.drain();

    dispatch(
        &app,
        &alice,
        ClientEvent::RequestCall {
            to: user("bob"),
            call_kind: CallKind::Audio,
        },
    )
    .await
    .unwrap();
    assert_eq!(
        bob.drain(),
        vec![ServerEvent::IncomingCall {
            from: user("alice"),
            call_kind: CallKind::Audio,
        }]
    );

    let offer = json!({ "type": "answer", "sdp": "v=0" });
    dispatch(
        &app,
        &bob,
        ClientEvent::AnswerCall {
            to: user("alice"),
            signal: offer.clone(),
        },
    )
    .await
    .unwrap();
    assert_eq!(
        alice.drain(),
        vec![ServerEvent::CallAnswered {
            from: user("bob"),
            signal: offer,
        }]
    );

    let candidate = json!({ "candidate": "candidate:1 1 udp 2122260223 10.0.0.2 54400 typ host" });
    dispatch(
        &app,
        &alice,
        ClientEvent::RelaySignal {
            to: user("bob"),
            signal: candidate.clone(),
        },
    )
    .await
    .unwrap();
    assert_eq!(
        bob.drain(),
        vec![ServerEvent::Signal {
            from: user("alice"),
            signal: candidate,
        }]
    );

    dispatch(&app, &bob, ClientEvent::EndCall { to: user("alice") })
        .await
        .unwrap();
    assert_eq!(
        alice.drain(),
        vec![ServerEvent::CallEnded {
            from: user("bob"),
            reason: CallEndReason::Hangup,
        }]
    );
    assert_eq!(app.state.connections.calls().active_calls(), 0);
}

#[tokio::test]
async fn test_call_to_offline_identity_fails() {
    let app = TestApp::new();
    let alice = app.connect("alice");

    let err = dispatch(
        &app,
        &alice,
        ClientEvent::RequestCall {
            to: user("bob"),
            call_kind: CallKind::Video,
        },
    )
    .await
    .unwrap_err();

    assert_eq!(err.code(), "USER_OFFLINE");
}

#[tokio::test]
async fn test_answer_without_ringing_is_rejected() {
    let app = TestApp::new();
    let alice = app.connect("alice");
    let _bob = app.connect("bob");

    let err = dispatch(
        &app,
        &alice,
        ClientEvent::AnswerCall {
            to: user("bob"),
            signal: json!({}),
        },
    )
    .await
    .unwrap_err();

    assert_eq!(err.code(), "INVALID_TRANSITION");
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_call_times_out() {
    let app = TestApp::new();
    let mut alice = app.connect("alice");
    let mut bob = app.connect("bob");
    alice.drain();

    dispatch(
        &app,
        &alice,
        ClientEvent::RequestCall {
            to: user("bob"),
            call_kind: CallKind::Audio,
        },
    )
    .await
    .unwrap();
    bob.drain();

    tokio::time::sleep(Duration::from_secs(46)).await;

    let timed_out = |events: Vec<ServerEvent>| {
        events
            .iter()
            .any(|e| matches!(e, ServerEvent::CallEnded { reason: CallEndReason::Timeout, .. }))
    };
    assert!(timed_out(alice.drain()));
    assert!(timed_out(bob.drain()));
    assert_eq!(app.state.connections.calls().active_calls(), 0);
}

#[tokio::test]
async fn test_disconnect_mid_call_notifies_peer() {
    let app = TestApp::new();
    let mut alice = app.connect("alice");
    let bob = app.connect("bob");
    dispatch(
        &app,
        &alice,
        ClientEvent::RequestCall {
            to: user("bob"),
            call_kind: CallKind::Audio,
        },
    )
    .await
    .unwrap();
    alice.drain();

    app.state.connections.disconnect(&bob.conn);

    let events = alice.drain();
    assert!(events.contains(&ServerEvent::CallEnded {
        from: user("bob"),
        reason: CallEndReason::PeerDisconnected,
    }));
}

#[tokio::test]
async fn test_answering_device_drop_ends_call_on_multi_device_identity() {
    let app = TestApp::new();
    let mut alice = app.connect("alice");
    let bob_phone = app.connect("bob");
    let mut bob_laptop = app.connect("bob");
    dispatch(
        &app,
        &alice,
        ClientEvent::RequestCall {
            to: user("bob"),
            call_kind: CallKind::Video,
        },
    )
    .await
    .unwrap();
    dispatch(
        &app,
        &bob_phone,
        ClientEvent::AnswerCall {
            to: user("alice"),
            signal: json!({ "type": "answer" }),
        },
    )
    .await
    .unwrap();
    alice.drain();
    bob_laptop.drain();

    app.state.connections.disconnect(&bob_phone.conn);

    assert_eq!(
        alice.drain(),
        vec![ServerEvent::CallEnded {
            from: user("bob"),
            reason: CallEndReason::PeerDisconnected,
        }]
    );
    assert_eq!(app.state.connections.calls().active_calls(), 0);
    // bob is still online on the laptop, so presence did not change
    assert!(bob_laptop.drain().is_empty());
}

#[tokio::test]
async fn test_join_room_not_on_roster() {
    let app = TestApp::new();
    let mallory = app.connect("mallory");

    let err = dispatch(
        &app,
        &mallory,
        ClientEvent::JoinRoom {
            room_id: RoomId::new("does-not-exist"),
        },
    )
    .await
    .unwrap_err();

    assert_eq!(err.code(), "NOT_FOUND");
}

#[tokio::test]
async fn test_error_event_shape() {
    let err = AppError::Forbidden("Join the room first".into());

    let value = serde_json::to_value(ServerEvent::error(Some("typing"), &err)).unwrap();

    assert_eq!(
        value,
        json!({
            "event": "error",
            "data": {
                "request": "typing",
                "code": "FORBIDDEN",
                "message": "Forbidden: Join the room first"
            }
        })
    );
}
