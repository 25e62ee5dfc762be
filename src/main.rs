//! # ChatPulse
//!
//! Presence and event fanout server.
//!
//! This is the application entry point that initializes:
//! - Configuration loading
//! - Tracing/logging subsystem
//! - The durable store (in-memory or PostgreSQL)
//! - HTTP/WebSocket server

use anyhow::Result;
use tracing::info;

use chatpulse::config::Settings;
use chatpulse::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    // Settings first: the log format is configurable
    let settings = Settings::load()?;
    chatpulse::telemetry::init_tracing(settings.log.json);

    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        store = ?settings.store.backend,
        "Configuration loaded"
    );

    let application = Application::build(settings).await?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    Ok(())
}
