//! Group API Tests

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::json;

use chatpulse::domain::RoomId;
use chatpulse::presentation::websocket::dispatch_client_event;
use chatpulse::realtime::ClientEvent;

use crate::common::{json_body, TestApp, TestClient};

async fn create_group(app: &TestApp, admin: &str, members: &[&str]) -> String {
    let body = json_body(
        app.post_json_auth(
            "/api/groups",
            json!({ "name": "crew", "members": members }),
            admin,
        )
        .await,
        StatusCode::CREATED,
    )
    .await;
    body["id"].as_str().unwrap().to_string()
}

async fn join(app: &TestApp, client: &TestClient, group_id: &str) {
    dispatch_client_event(
        &app.state.connections,
        &client.conn,
        ClientEvent::JoinRoom {
            room_id: RoomId::new(group_id),
        },
    )
    .await
    .unwrap();
}

async fn post(app: &TestApp, group_id: &str, from: &str, text: &str) -> serde_json::Value {
    json_body(
        app.post_json_auth(
            &format!("/api/groups/{}/messages", group_id),
            json!({ "text": text }),
            from,
        )
        .await,
        StatusCode::CREATED,
    )
    .await
}

#[tokio::test]
async fn test_create_and_get_group() {
    let app = TestApp::new();
    let id = create_group(&app, "alice", &["bob", "alice"]).await;

    let body = json_body(
        app.get_auth(&format!("/api/groups/{}", id), "bob").await,
        StatusCode::OK,
    )
    .await;

    assert_eq!(body["adminId"], "alice");
    assert_eq!(body["members"], json!(["alice", "bob"]));

    let response = app.get_auth(&format!("/api/groups/{}", id), "mallory").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_group_message_fanout_to_joined_members() {
    let app = TestApp::new();
    let id = create_group(&app, "alice", &["bob", "carol"]).await;
    let mut alice = app.connect("alice");
    let mut bob = app.connect("bob");
    // carol is online but has not joined the room
    let mut carol = app.connect("carol");
    join(&app, &alice, &id).await;
    join(&app, &bob, &id).await;
    alice.drain();
    bob.drain();
    carol.drain();

    let body = post(&app, &id, "alice", "hello crew").await;

    assert_eq!(body["status"], "delivered");
    assert_eq!(bob.event_names(), vec!["newGroupMessage"]);
    assert_eq!(alice.event_names(), vec!["groupMessageStatusChanged"]);
    assert!(carol.drain().is_empty());
}

#[tokio::test]
async fn test_group_message_without_listeners_stays_sent() {
    let app = TestApp::new();
    let id = create_group(&app, "alice", &["bob"]).await;
    let mut alice = app.connect("alice");
    join(&app, &alice, &id).await;

    let body = post(&app, &id, "alice", "anyone?").await;

    assert_eq!(body["status"], "sent");
}

#[tokio::test]
async fn test_non_member_cannot_post() {
    let app = TestApp::new();
    let id = create_group(&app, "alice", &["bob"]).await;

    let response = app
        .post_json_auth(
            &format!("/api/groups/{}/messages", id),
            json!({ "text": "let me in" }),
            "mallory",
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .post_json_auth(
            "/api/groups/no-such-group/messages",
            json!({ "text": "hi" }),
            "alice",
        )
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_read_receipts_are_idempotent() {
    let app = TestApp::new();
    let id = create_group(&app, "alice", &["bob"]).await;
    let message_id = post(&app, &id, "alice", "read me").await["id"]
        .as_str()
        .unwrap()
        .to_string();
    let mut alice = app.connect("alice");
    join(&app, &alice, &id).await;
    alice.drain();

    let uri = format!("/api/groups/messages/{}/read", message_id);
    let body = json_body(app.put_auth(&uri, "bob").await, StatusCode::OK).await;
    assert_eq!(body["readBy"], json!(["bob"]));
    assert_eq!(alice.event_names(), vec!["groupMessageRead"]);

    json_body(app.put_auth(&uri, "bob").await, StatusCode::OK).await;
    assert!(alice.drain().is_empty());

    // The author reading their own message changes nothing.
    let body = json_body(app.put_auth(&uri, "alice").await, StatusCode::OK).await;
    assert_eq!(body["readBy"], json!(["bob"]));
}

#[tokio::test]
async fn test_admin_may_delete_any_message() {
    let app = TestApp::new();
    let id = create_group(&app, "alice", &["bob", "carol"]).await;
    let message_id = post(&app, &id, "bob", "oops").await["id"]
        .as_str()
        .unwrap()
        .to_string();
    let mut bob = app.connect("bob");
    join(&app, &bob, &id).await;
    bob.drain();
    let uri = format!("/api/groups/messages/{}", message_id);

    assert_eq!(app.delete_auth(&uri, "carol").await.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.delete_auth(&uri, "alice").await.status(), StatusCode::NO_CONTENT);
    assert_eq!(bob.event_names(), vec!["messageDeleted"]);

    let body = json_body(
        app.get_auth(&format!("/api/groups/{}/messages", id), "carol").await,
        StatusCode::OK,
    )
    .await;
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_group_edit_and_reactions_reach_room() {
    let app = TestApp::new();
    let id = create_group(&app, "alice", &["bob"]).await;
    let message_id = post(&app, &id, "alice", "draft").await["id"]
        .as_str()
        .unwrap()
        .to_string();
    let mut bob = app.connect("bob");
    join(&app, &bob, &id).await;
    bob.drain();

    let uri = format!("/api/groups/messages/{}", message_id);
    assert_eq!(
        app.put_json_auth(&uri, json!({ "text": "final" }), "bob").await.status(),
        StatusCode::FORBIDDEN
    );
    let body = json_body(
        app.put_json_auth(&uri, json!({ "text": "final" }), "alice").await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(body["isEdited"], true);

    let reactions = format!("{}/reactions", uri);
    json_body(
        app.post_json_auth(&reactions, json!({ "emoji": "🔥" }), "bob").await,
        StatusCode::OK,
    )
    .await;

    assert_eq!(bob.event_names(), vec!["messageEdited", "reactionsChanged"]);
}

#[tokio::test]
async fn test_user_groups_lists_memberships() {
    let app = TestApp::new();
    create_group(&app, "alice", &["bob"]).await;
    create_group(&app, "carol", &["bob"]).await;

    let body = json_body(app.get_auth("/api/groups", "bob").await, StatusCode::OK).await;
    assert_eq!(body.as_array().unwrap().len(), 2);

    let body = json_body(app.get_auth("/api/groups", "alice").await, StatusCode::OK).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_admin_manages_roster() {
    let app = TestApp::new();
    let id = create_group(&app, "alice", &["bob"]).await;
    let uri = format!("/api/groups/{}", id);

    let response = app
        .put_json_auth(&uri, json!({ "name": "mine now" }), "bob")
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let body = json_body(
        app.put_json_auth(&uri, json!({ "description": "weekend crew" }), "alice")
            .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(body["name"], "crew");
    assert_eq!(body["description"], "weekend crew");

    let members = format!("{}/members", uri);
    let response = app
        .post_json_auth(&members, json!({ "members": [] }), "alice")
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(
        app.post_json_auth(&members, json!({ "members": ["carol", "bob"] }), "alice")
            .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(body["members"], json!(["alice", "bob", "carol"]));

    let response = app
        .delete_auth(&format!("{}/members/alice", uri), "alice")
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let response = app.delete_auth(&format!("{}/members/carol", uri), "bob").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_removed_member_stops_receiving_room_events() {
    let app = TestApp::new();
    let id = create_group(&app, "alice", &["bob", "carol"]).await;
    let mut alice = app.connect("alice");
    let mut bob = app.connect("bob");
    join(&app, &alice, &id).await;
    join(&app, &bob, &id).await;
    alice.drain();
    bob.drain();

    let body = json_body(
        app.delete_auth(&format!("/api/groups/{}/members/bob", id), "alice")
            .await,
        StatusCode::OK,
    )
    .await;
    assert_eq!(body["members"], json!(["alice", "carol"]));
    assert_eq!(alice.event_names(), vec!["roomPresenceChanged"]);

    post(&app, &id, "alice", "bob is gone").await;
    assert!(bob.drain().is_empty());

    // carol leaves on her own
    json_body(
        app.delete_auth(&format!("/api/groups/{}/members/carol", id), "carol")
            .await,
        StatusCode::OK,
    )
    .await;
    let response = app.get_auth(&format!("/api/groups/{}", id), "carol").await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_delete_group_removes_history() {
    let app = TestApp::new();
    let id = create_group(&app, "alice", &["bob"]).await;
    post(&app, &id, "bob", "last words").await;
    let uri = format!("/api/groups/{}", id);

    assert_eq!(app.delete_auth(&uri, "bob").await.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.delete_auth(&uri, "alice").await.status(), StatusCode::NO_CONTENT);

    assert_eq!(app.get_auth(&uri, "alice").await.status(), StatusCode::NOT_FOUND);
    let response = app
        .get_auth(&format!("{}/messages", uri), "bob")
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
