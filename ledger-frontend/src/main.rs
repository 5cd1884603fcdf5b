use dotenvy::dotenv;
use ledger_frontend::config::get_configuration;
use ledger_frontend::services::{init_metrics, metrics};
use ledger_frontend::startup::build_router;
use ledger_frontend::AppState;
use service_core::observability::logging::init_tracing;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let configuration = get_configuration().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    init_tracing(
        "ledger-frontend",
        &configuration.telemetry.log_level,
        configuration.telemetry.otlp_endpoint.as_deref(),
    );

    init_metrics()?;

    let address = format!(
        "{}:{}",
        configuration.server.host, configuration.server.port
    );
    let state = AppState::new(configuration);

    // Kept alive for the whole process; dropping it would unsubscribe.
    let sessions = Arc::downgrade(&state.sessions);
    let _auth_events = state.sessions.subscribe(move |event| {
        metrics::record_auth_event(event);
        if let Some(sessions) = sessions.upgrade() {
            metrics::record_active_sessions(sessions.active_sessions());
        }
    });

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&address).await.map_err(|e| {
        tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
        anyhow::anyhow!("Failed to bind to address {}: {}", address, e)
    })?;

    info!("Starting ledger-frontend on {}", address);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|e| {
        tracing::error!("Server error: {}", e);
        anyhow::anyhow!("Server error: {}", e)
    })?;

    Ok(())
}
