//! Direct Message API Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;

use chatpulse::domain::{MessageId, MessageStatus, UserId};
use chatpulse::realtime::ServerEvent;

use crate::common::{json_body, TestApp};

async fn send(app: &TestApp, from: &str, to: &str, text: &str) -> serde_json::Value {
    json_body(
        app.post_json_auth(&format!("/api/messages/send/{}", to), json!({ "text": text }), from)
            .await,
        StatusCode::CREATED,
    )
    .await
}

fn message_id(body: &serde_json::Value) -> MessageId {
    MessageId::parse(body["id"].as_str().unwrap()).unwrap()
}

#[tokio::test]
async fn test_send_to_offline_receiver_stays_sent() {
    let app = TestApp::new();

    let body = send(&app, "alice", "bob", "hi").await;

    assert_eq!(body["status"], "sent");
    assert_eq!(body["senderId"], "alice");
    assert_eq!(body["receiverId"], "bob");
    assert_eq!(body["text"], "hi");
}

#[tokio::test]
async fn test_send_to_online_receiver_is_delivered() {
    let app = TestApp::new();
    let mut alice = app.connect("alice");
    let mut bob = app.connect("bob");
    alice.drain();

    let body = send(&app, "alice", "bob", "hi").await;
    let id = message_id(&body);

    assert_eq!(body["status"], "delivered");
    assert_eq!(bob.event_names(), vec!["newMessage"]);
    assert_eq!(
        alice.drain(),
        vec![ServerEvent::MessageStatusChanged {
            message_id: id,
            status: MessageStatus::Delivered,
        }]
    );
}

#[tokio::test]
async fn test_every_device_of_receiver_gets_new_message() {
    let app = TestApp::new();
    let mut phone = app.connect("bob");
    let mut laptop = app.connect("bob");

    send(&app, "alice", "bob", "hi").await;

    assert_eq!(phone.event_names(), vec!["newMessage"]);
    assert_eq!(laptop.event_names(), vec!["newMessage"]);
}

#[tokio::test]
async fn test_empty_message_rejected() {
    let app = TestApp::new();

    let response = app
        .post_json_auth("/api/messages/send/bob", json!({ "text": "   " }), "alice")
        .await;
    let body = json_body(response, StatusCode::BAD_REQUEST).await;

    assert_eq!(body["code"], "VALIDATION");
}

#[tokio::test]
async fn test_opening_conversation_marks_read() {
    let app = TestApp::new();
    let first = message_id(&send(&app, "alice", "bob", "one").await);
    let second = message_id(&send(&app, "alice", "bob", "two").await);
    send(&app, "bob", "alice", "three").await;
    let mut alice = app.connect("alice");

    let body = json_body(app.get_auth("/api/messages/alice", "bob").await, StatusCode::OK).await;
    let statuses: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["status"].as_str().unwrap())
        .collect();

    // Only messages addressed to bob are read.
    assert_eq!(statuses, vec!["read", "read", "sent"]);
    assert_eq!(
        alice.drain(),
        vec![
            ServerEvent::MessageStatusChanged {
                message_id: first,
                status: MessageStatus::Read,
            },
            ServerEvent::MessageStatusChanged {
                message_id: second,
                status: MessageStatus::Read,
            },
        ]
    );

    // Reading again produces no events.
    app.get_auth("/api/messages/alice", "bob").await;
    assert!(alice.drain().is_empty());
}

#[tokio::test]
async fn test_status_update_rules() {
    let app = TestApp::new();
    let id = send(&app, "alice", "bob", "hi").await["id"]
        .as_str()
        .unwrap()
        .to_string();
    let uri = format!("/api/messages/status/{}", id);

    // Only the receiver may move status.
    let response = app.put_json_auth(&uri, json!({ "status": "read" }), "alice").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = json_body(
        app.put_json_auth(&uri, json!({ "status": "read" }), "bob").await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(body["status"], "read");

    // Never backward.
    let body = json_body(
        app.put_json_auth(&uri, json!({ "status": "delivered" }), "bob").await,
        StatusCode::CONFLICT,
    )
    .await;
    assert_eq!(body["code"], "INVALID_TRANSITION");
}

#[tokio::test]
async fn test_reactions_broadcast_to_both_participants() {
    let app = TestApp::new();
    let id = send(&app, "alice", "bob", "hi").await["id"]
        .as_str()
        .unwrap()
        .to_string();
    let mut alice = app.connect("alice");
    let mut bob = app.connect("bob");
    alice.drain();

    let uri = format!("/api/messages/{}/reactions", id);
    let body = json_body(
        app.post_json_auth(&uri, json!({ "emoji": "👍" }), "bob").await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(body["reactions"], json!([{ "userId": "bob", "emoji": "👍" }]));
    assert_eq!(alice.event_names(), vec!["reactionsChanged"]);
    assert_eq!(bob.event_names(), vec!["reactionsChanged"]);

    // Replacing keeps one reaction per identity.
    let body = json_body(
        app.post_json_auth(&uri, json!({ "emoji": "🎉" }), "bob").await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(body["reactions"].as_array().unwrap().len(), 1);

    json_body(app.delete_auth(&uri, "bob").await, StatusCode::OK).await;
    let body = json_body(app.delete_auth(&uri, "bob").await, StatusCode::CONFLICT).await;
    assert_eq!(body["code"], "NO_REACTION");

    // Outsiders cannot react.
    let response = app
        .post_json_auth(&uri, json!({ "emoji": "👀" }), "mallory")
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_edit_and_delete_are_author_only() {
    let app = TestApp::new();
    let id = send(&app, "alice", "bob", "hi").await["id"]
        .as_str()
        .unwrap()
        .to_string();
    let mut bob = app.connect("bob");
    let uri = format!("/api/messages/{}", id);

    let response = app.put_json_auth(&uri, json!({ "text": "edited" }), "bob").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = json_body(
        app.put_json_auth(&uri, json!({ "text": "hello" }), "alice").await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(body["text"], "hello");
    assert_eq!(body["isEdited"], true);
    assert_eq!(bob.event_names(), vec!["messageEdited"]);

    assert_eq!(app.delete_auth(&uri, "bob").await.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.delete_auth(&uri, "alice").await.status(), StatusCode::NO_CONTENT);
    assert_eq!(bob.event_names(), vec!["messageDeleted"]);

    // Gone for everyone afterwards.
    let body = json_body(app.get_auth("/api/messages/alice", "bob").await, StatusCode::OK).await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_forward_creates_new_message_from_forwarder() {
    let app = TestApp::new();
    let id = send(&app, "alice", "bob", "meme").await["id"]
        .as_str()
        .unwrap()
        .to_string();
    let mut carol = app.connect("carol");

    let body = json_body(
        app.post_json_auth(
            &format!("/api/messages/forward/{}", id),
            json!({ "to": "carol" }),
            "bob",
        )
        .await,
        StatusCode::CREATED,
    )
    .await;

    assert_ne!(body["id"], id.as_str());
    assert_eq!(body["senderId"], "bob");
    assert_eq!(body["text"], "meme");
    assert_eq!(body["status"], "delivered");
    match &carol.drain()[..] {
        [ServerEvent::NewMessage(message)] => assert_eq!(message.sender_id, UserId::new("bob")),
        other => panic!("unexpected events: {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_message_id_is_bad_request() {
    let app = TestApp::new();

    let response = app
        .put_json_auth("/api/messages/status/not-a-uuid", json!({ "status": "read" }), "bob")
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
