//! EQO Monitor Binary
//!
//! Runs the live quake feed monitor and serves its display state over HTTP.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin eqo-monitor
//!
//! # With geocoded intensity markers
//! OPENCAGE_API_KEY=... cargo run --bin eqo-monitor
//! ```
//!
//! # Environment Variables
//!
//! - `HOST`: Server host (default: 0.0.0.0)
//! - `PORT`: Server port (default: 8080)
//! - `EQO_FEED_URL`: Feed WebSocket URL
//! - `EQO_HISTORY_URL`: Startup history endpoint
//! - `EQO_STATE_DIR`: Directory for persisted markers, geocode cache and audio
//! - `OPENCAGE_API_KEY`: Geocoding key for intensity markers
//! - `RUST_LOG`: Log level (default: info)

use std::env;
use std::net::SocketAddr;

use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use eqo_rust::http::{create_router, AppState};
use eqo_rust::{MonitorConfig, QuakeMonitor};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(
            env::var("RUST_LOG")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(Level::INFO),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("Starting EQO monitor");

    let config = MonitorConfig::load()?;
    info!(
        "Feed {} (reconnect after {}ms), state in {}",
        config.feed.url,
        config.feed.reconnect_delay_ms,
        config.storage.state_dir.display()
    );

    let addr: SocketAddr = format!("{}:{}", config.http.host, config.http.port).parse()?;
    let monitor = QuakeMonitor::builder(config).start()?;

    let app = create_router(AppState::new(monitor.handle()));

    info!("Server listening on http://{}", addr);
    info!("Display state: http://{}/v1/display", addr);

    // Stopping the monitor ends open display streams, which lets the
    // server finish draining
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            monitor.stop().await;
        })
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
