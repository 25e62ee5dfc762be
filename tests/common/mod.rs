//! Common Test Utilities
//!
//! Router over the in-memory store plus token and request helpers.

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;

use chatpulse::config::{
    CallSettings, CorsSettings, DatabaseSettings, JwtSettings, LogSettings, ServerSettings,
    Settings, StoreBackend, StoreSettings, WebSocketSettings,
};
use chatpulse::domain::UserId;
use chatpulse::presentation::middleware::Claims;
use chatpulse::realtime::{Connection, ServerEvent};
use chatpulse::startup::{build_router, AppState, Stores};

pub const TEST_SECRET: &str = "integration-test-secret-0123456789abcdef";

pub fn test_settings() -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".into(),
            port: 0,
        },
        store: StoreSettings {
            backend: StoreBackend::Memory,
        },
        database: DatabaseSettings {
            url: None,
            max_connections: 1,
            min_connections: 0,
            acquire_timeout: 1,
        },
        jwt: JwtSettings {
            secret: TEST_SECRET.into(),
        },
        cors: CorsSettings {
            allowed_origins: vec!["*".into()],
        },
        websocket: WebSocketSettings {
            max_message_size: 65536,
            max_frame_size: 16384,
            heartbeat_interval_ms: 41250,
            identify_timeout_secs: 30,
        },
        calls: CallSettings {
            ring_timeout_secs: 45,
        },
        log: LogSettings { json: false },
        environment: "test".into(),
    }
}

/// Sign a token the way the external auth service would.
pub fn token_for(user: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user.into(),
        exp: now + 3600,
        iat: now,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .unwrap()
}

/// A connected device: the gateway handle plus what it receives.
pub struct TestClient {
    pub conn: std::sync::Arc<Connection>,
    pub events: mpsc::UnboundedReceiver<ServerEvent>,
}

impl TestClient {
    pub fn drain(&mut self) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    pub fn event_names(&mut self) -> Vec<&'static str> {
        self.drain().iter().map(ServerEvent::name).collect()
    }
}

/// Test application builder
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        let state = AppState::new(test_settings(), Stores::in_memory());
        Self {
            router: build_router(state.clone()),
            state,
        }
    }

    /// Connect a device for `user` and discard its `ready`/presence frames.
    pub fn connect(&self, user: &str) -> TestClient {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = self.state.connections.connect(UserId::new(user), tx);
        let mut client = TestClient { conn, events: rx };
        client.drain();
        client
    }

    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        user: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header("Authorization", format!("Bearer {}", token_for(user)));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("Content-Type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        self.router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap()
    }

    /// Make a GET request to the application
    pub async fn get(&self, uri: &str) -> Response {
        self.request("GET", uri, None, None).await
    }

    pub async fn get_auth(&self, uri: &str, user: &str) -> Response {
        self.request("GET", uri, Some(user), None).await
    }

    pub async fn post_json_auth(&self, uri: &str, body: Value, user: &str) -> Response {
        self.request("POST", uri, Some(user), Some(body)).await
    }

    pub async fn put_json_auth(&self, uri: &str, body: Value, user: &str) -> Response {
        self.request("PUT", uri, Some(user), Some(body)).await
    }

    pub async fn put_auth(&self, uri: &str, user: &str) -> Response {
        self.request("PUT", uri, Some(user), None).await
    }

    pub async fn delete_auth(&self, uri: &str, user: &str) -> Response {
        self.request("DELETE", uri, Some(user), None).await
    }
}

/// Assert the status and return the JSON body (Null for empty bodies).
pub async fn json_body(response: Response, expected: StatusCode) -> Value {
    assert_eq!(response.status(), expected);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    }
}
