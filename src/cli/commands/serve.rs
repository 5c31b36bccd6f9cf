//! Serve command handler

use std::net::SocketAddr;
use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use tokio::signal;
use tower_sessions::session_store::ExpiredDeletion;
use tracing::{error, info};

use crate::api;
use crate::config::Config;
use crate::services::Maintenance;
use crate::state::SharedState;

const SESSION_SWEEP_INTERVAL_SECS: u64 = 60;

pub async fn cmd_serve(
    config: Config,
    prometheus_handle: Option<PrometheusHandle>,
) -> anyhow::Result<()> {
    info!("Agora v{} starting...", env!("CARGO_PKG_VERSION"));

    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    let maintenance_config = config.maintenance.clone();

    let shared = Arc::new(SharedState::new(config).await?);
    let api_state = api::create_app_state(Arc::clone(&shared), prometheus_handle).await?;

    let session_sweeper = tokio::spawn(
        api_state
            .session_store
            .clone()
            .continuously_delete_expired(tokio::time::Duration::from_secs(
                SESSION_SWEEP_INTERVAL_SECS,
            )),
    );

    let maintenance = Arc::new(Maintenance::new(
        Arc::clone(&shared.resets),
        maintenance_config,
    ));
    let maintenance_handle = {
        let maintenance = Arc::clone(&maintenance);
        tokio::spawn(async move {
            if let Err(e) = maintenance.start().await {
                error!("Maintenance scheduler error: {}", e);
            }
        })
    };

    let app = api::router(api_state).await;
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Web server running at http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    maintenance.stop().await;
    if let Err(e) = maintenance_handle.await {
        error!("Maintenance task ended abnormally: {}", e);
    }
    session_sweeper.abort();

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!("Error listening for shutdown: {}", e),
    }
}
