//! Application Startup
//!
//! Application building and server initialization.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::application::services::{GroupMessageService, MessageService};
use crate::config::{Settings, StoreBackend};
use crate::domain::{GroupMessageRepository, GroupRepository, MessageRepository};
use crate::infrastructure::database;
use crate::infrastructure::repositories::{
    InMemoryStore, PgGroupMessageRepository, PgGroupRepository, PgMessageRepository,
};
use crate::presentation::http::{create_router, handlers::health};
use crate::presentation::middleware::cors;
use crate::realtime::{CallRelay, ConnectionManager, Gateway};

/// Durable store collaborators selected by `store.backend`.
#[derive(Clone)]
pub struct Stores {
    pub messages: Arc<dyn MessageRepository>,
    pub groups: Arc<dyn GroupRepository>,
    pub group_messages: Arc<dyn GroupMessageRepository>,
    pub db: Option<PgPool>,
}

impl Stores {
    pub fn in_memory() -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self {
            messages: store.clone(),
            groups: store.clone(),
            group_messages: store,
            db: None,
        }
    }

    /// Connect, migrate and wrap the PostgreSQL repositories.
    pub async fn postgres(settings: &Settings) -> Result<Self> {
        let url = settings
            .database
            .url
            .as_deref()
            .context("database.url is required for the postgres backend")?;

        let pool = database::create_pool(&settings.database, url).await?;
        tracing::info!("Database connection pool created");

        database::run_migrations(&pool).await?;
        tracing::info!("Database migrations applied");

        Ok(Self {
            messages: Arc::new(PgMessageRepository::new(pool.clone())),
            groups: Arc::new(PgGroupRepository::new(pool.clone())),
            group_messages: Arc::new(PgGroupMessageRepository::new(pool.clone())),
            db: Some(pool),
        })
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub connections: Arc<ConnectionManager>,
    pub messages: Arc<MessageService>,
    pub group_messages: Arc<GroupMessageService>,
    pub db: Option<PgPool>,
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Wire the realtime core and the message services over `stores`.
    pub fn new(settings: Settings, stores: Stores) -> Self {
        let gateway = Arc::new(Gateway::new(settings.websocket.heartbeat_interval_ms));
        let calls = Arc::new(CallRelay::new(
            gateway.clone(),
            settings.calls.ring_timeout(),
        ));
        let connections = Arc::new(ConnectionManager::new(
            gateway.clone(),
            calls,
            stores.groups.clone(),
        ));

        let messages = Arc::new(MessageService::new(stores.messages, gateway.clone()));
        let group_messages = Arc::new(GroupMessageService::new(
            stores.groups,
            stores.group_messages,
            gateway.clone(),
        ));

        Self {
            gateway,
            connections,
            messages,
            group_messages,
            db: stores.db,
            settings: Arc::new(settings),
        }
    }
}

/// Full router with tracing and CORS layers.
pub fn build_router(state: AppState) -> Router {
    let cors = cors::create_cors_layer(&state.settings.cors);
    create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        health::init_server_start();

        let stores = match settings.store.backend {
            StoreBackend::Memory => {
                tracing::warn!("Using the in-memory store; data is lost on restart");
                Stores::in_memory()
            }
            StoreBackend::Postgres => Stores::postgres(&settings).await?,
        };

        let addr = settings.server_addr();
        let router = build_router(AppState::new(settings, stores));

        let listener = TcpListener::bind(addr.as_str())
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        tracing::info!("Listening on {}", listener.local_addr()?);

        Ok(Self { listener, router })
    }

    /// Run the server until stopped
    pub async fn run_until_stopped(self) -> Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
