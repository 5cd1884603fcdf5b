//! Prometheus exposition for ledger-frontend.
//!
//! HTTP metrics come from the service-core middleware and backend call
//! metrics from the backend client; both go through the `metrics` facade
//! into the recorder installed here.

use crate::services::session::AuthEvent;
use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global recorder. Fails when a recorder is already installed.
pub fn init_metrics() -> anyhow::Result<()> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install Prometheus recorder: {}", e))?;

    METRICS_HANDLE
        .set(handle)
        .map_err(|_| anyhow::anyhow!("metrics handle already initialized"))?;
    Ok(())
}

/// Metrics output in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

/// Session-context listener counting auth events.
pub fn record_auth_event(event: &AuthEvent) {
    counter!("auth_events_total", "event" => event.kind.as_str()).increment(1);
    if let Some(user_id) = event.user_id {
        tracing::info!(user_id = %user_id, event = event.kind.as_str(), "Auth event");
    }
}

pub fn record_active_sessions(count: usize) {
    gauge!("auth_active_sessions").set(count as f64);
}
