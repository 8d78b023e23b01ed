//! Countdown Sync - host binary
//!
//! Serves the ingest API and drives the display ticker.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use countdown_sync::{
    api::create_router,
    clock::SystemClock,
    config::Config,
    state::AppState,
    tasks::{clock_watchdog_task, display_ticker_task},
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing with appropriate log level
    tracing_subscriber::fmt()
        .with_env_filter(format!("countdown_sync={},tower_http=info", config.log_level()))
        .init();

    info!("Starting countdown-sync v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration: host={}, port={}, overlay={}ms, skew={}",
        config.host,
        config.port,
        config.finished_overlay_ms,
        if config.no_skew { "disabled" } else { "enabled" }
    );

    let state = Arc::new(AppState::new(
        config.port,
        config.host.clone(),
        SystemClock::shared(),
        config.controller_config(),
    ));

    tokio::spawn(display_ticker_task(Arc::clone(&state)));
    tokio::spawn(clock_watchdog_task(Arc::clone(&state)));

    let app = create_router(state);

    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  POST /snapshot    - Ingest a remote timer snapshot");
    info!("  POST /server-time - Ingest a server timestamp");
    info!("  POST /finished    - Explicit finished event");
    info!("  POST /reset       - Reconnect / entity change");
    info!("  GET  /status      - Current display frame");
    info!("  GET  /health      - Health check");

    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}
