//! Prometheus Metrics Module
//!
//! Process-wide counters and gauges for the realtime core.
//!
//! # Metrics Collected
//! - Live connection and online identity gauges
//! - Delivered events by event name
//! - Events dropped because the recipient was offline
//! - Call outcomes (ringing, answered, rejected, timeout, ...)

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// Live connection handles across all identities
pub static CONNECTIONS_ACTIVE: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new("connections_active", "Number of live connection handles").namespace("chatpulse"),
    )
    .expect("Failed to create CONNECTIONS_ACTIVE metric")
});

/// Identities holding at least one live handle
pub static ONLINE_IDENTITIES: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::with_opts(
        Opts::new("online_identities", "Number of identities currently online")
            .namespace("chatpulse"),
    )
    .expect("Failed to create ONLINE_IDENTITIES metric")
});

/// Events pushed to connection handles, by event name
pub static EVENTS_DELIVERED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("events_delivered_total", "Events delivered to connection handles")
            .namespace("chatpulse"),
        &["event"],
    )
    .expect("Failed to create EVENTS_DELIVERED_TOTAL metric")
});

/// Events addressed to an identity with no live handle
pub static EVENTS_DROPPED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("events_dropped_total", "Events dropped for offline recipients")
            .namespace("chatpulse"),
        &["event"],
    )
    .expect("Failed to create EVENTS_DROPPED_TOTAL metric")
});

/// Call relay transitions, by outcome
pub static CALLS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("calls_total", "Call relay transitions by outcome").namespace("chatpulse"),
        &["outcome"],
    )
    .expect("Failed to create CALLS_TOTAL metric")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(CONNECTIONS_ACTIVE.clone()))
        .expect("Failed to register CONNECTIONS_ACTIVE");
    registry
        .register(Box::new(ONLINE_IDENTITIES.clone()))
        .expect("Failed to register ONLINE_IDENTITIES");
    registry
        .register(Box::new(EVENTS_DELIVERED_TOTAL.clone()))
        .expect("Failed to register EVENTS_DELIVERED_TOTAL");
    registry
        .register(Box::new(EVENTS_DROPPED_TOTAL.clone()))
        .expect("Failed to register EVENTS_DROPPED_TOTAL");
    registry
        .register(Box::new(CALLS_TOTAL.clone()))
        .expect("Failed to register CALLS_TOTAL");
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

pub fn record_delivery(event: &str, handles: usize) {
    EVENTS_DELIVERED_TOTAL
        .with_label_values(&[event])
        .inc_by(handles as u64);
}

pub fn record_dropped(event: &str) {
    EVENTS_DROPPED_TOTAL.with_label_values(&[event]).inc();
}

pub fn record_call(outcome: &str) {
    CALLS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Helper to update presence gauges after a registry change
pub fn set_presence(connections: usize, identities: usize) {
    CONNECTIONS_ACTIVE.set(connections as i64);
    ONLINE_IDENTITIES.set(identities as i64);
}
