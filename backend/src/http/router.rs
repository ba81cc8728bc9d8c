//! Router configuration for the HTTP API.
//!
//! This module sets up all routes, middleware (CORS, compression, tracing),
//! and creates the axum router ready for serving.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use super::state::AppState;

/// Create the main application router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    // The display front-end is served from another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Display state
        .route("/display", get(handlers::get_display))
        .route("/display/stream", get(handlers::stream_display))
        // History
        .route("/history", get(handlers::list_history))
        .route("/history/export", get(handlers::export_history))
        .route("/history/{identity}/select", post(handlers::select_history_entry))
        // Alert overlay
        .route("/alert/dismiss", post(handlers::dismiss_alert))
        // Simulation hooks
        .route("/simulate/quake", post(handlers::simulate_quake))
        .route("/simulate/alert", post(handlers::simulate_alert))
        // Speech proxy
        .route("/voicevox", post(handlers::synthesize_speech));

    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/v1", api_v1)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
