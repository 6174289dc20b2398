use dotenvy::dotenv;
use recovery_portal::config::get_configuration;
use recovery_portal::startup::build_router;
use recovery_portal::AppState;
use service_core::observability::init_tracing;
use std::net::SocketAddr;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let configuration = get_configuration().map_err(|e| {
        eprintln!("Failed to read configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;

    // Initialize tracing using shared logic
    init_tracing(
        "recovery-portal",
        &configuration.telemetry.log_level,
        configuration.telemetry.otlp_endpoint.as_deref(),
    );

    recovery_portal::services::metrics::init_metrics()
        .map_err(|e| anyhow::anyhow!("Failed to register metrics: {}", e))?;

    let address = format!(
        "{}:{}",
        configuration.server.host, configuration.server.port
    );
    info!(
        platform = %configuration.platform.url,
        return_url = %configuration.recovery_return_url(),
        "Recovery portal configured"
    );

    let app = build_router(AppState::new(configuration));

    let listener = tokio::net::TcpListener::bind(&address).await.map_err(|e| {
        tracing::error!("Failed to bind TCP listener to {}: {}", address, e);
        anyhow::anyhow!("Failed to bind to address {}: {}", address, e)
    })?;

    info!("Starting recovery-portal on {}", address);
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
