//! HTTP handlers for the REST API.
//!
//! Each handler corresponds to an API endpoint and delegates to the
//! monitor handle.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::header,
    response::sse::{Event, KeepAlive, Sse},
    response::{IntoResponse, Response},
    Json,
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tracing::{info, warn};

use super::dto::{
    DismissResponse, DisplaySnapshot, HealthResponse, HistoryEntryDto, HistoryListResponse,
    SimulateAlertRequest, SimulateResponse, SpeechRequest,
};
use super::error::AppError;
use super::state::AppState;
use crate::models::{EventIdentity, FeedMessage};
use crate::services::DEFAULT_EXPORT_FILE_NAME;

/// Result type for handlers.
pub type HandlerResult<T> = Result<Json<T>, AppError>;

// =============================================================================
// Health Check
// =============================================================================

/// GET /health
///
/// Health check endpoint with feed connection counters.
pub async fn health_check(State(state): State<AppState>) -> HandlerResult<HealthResponse> {
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: "v1".to_string(),
        history_entries: state.monitor.feed().history_len(),
        feed: state.monitor.connection_stats(),
    }))
}

// =============================================================================
// Display
// =============================================================================

/// GET /v1/display
///
/// The current display state.
pub async fn get_display(State(state): State<AppState>) -> HandlerResult<DisplaySnapshot> {
    Ok(Json(state.monitor.snapshot()))
}

/// GET /v1/display/stream
///
/// Stream display states via Server-Sent Events (SSE). The current state is
/// sent immediately, then every newly published one.
pub async fn stream_display(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut updates = state.monitor.subscribe();
    let stream = async_stream::stream! {
        loop {
            let snapshot = updates.borrow_and_update().clone();
            let event_data = serde_json::to_string(&snapshot).unwrap_or_default();
            yield Ok(Event::default().event("display").data(event_data));

            if updates.changed().await.is_err() {
                break;
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

// =============================================================================
// History
// =============================================================================

/// GET /v1/history
///
/// The buffered history, newest first.
pub async fn list_history(State(state): State<AppState>) -> HandlerResult<HistoryListResponse> {
    let entries: Vec<HistoryEntryDto> = state.monitor.history().into_iter().map(Into::into).collect();
    let total = entries.len();
    Ok(Json(HistoryListResponse { entries, total }))
}

/// GET /v1/history/export
///
/// Download the buffered reports as a JSON file.
pub async fn export_history(State(state): State<AppState>) -> Result<Response, AppError> {
    let json = state.monitor.export_history_json()?;
    let disposition = format!("attachment; filename=\"{}\"", DEFAULT_EXPORT_FILE_NAME);
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        json,
    )
        .into_response())
}

/// POST /v1/history/{identity}/select
///
/// Pin a history entry. The identity is the report's `time` string,
/// percent-encoded.
pub async fn select_history_entry(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> HandlerResult<DisplaySnapshot> {
    let identity = EventIdentity::new(identity);
    let snapshot = state.monitor.select_history_entry(&identity).await?;
    info!("Pinned history entry {}", identity);
    Ok(Json(snapshot))
}

// =============================================================================
// Alert
// =============================================================================

/// POST /v1/alert/dismiss
pub async fn dismiss_alert(State(state): State<AppState>) -> HandlerResult<DismissResponse> {
    let dismissed = state.monitor.dismiss_alert().await?;
    Ok(Json(DismissResponse { dismissed }))
}

// =============================================================================
// Simulation
// =============================================================================

/// POST /v1/simulate/quake
///
/// Inject a quake report (feed JSON shape) as if it arrived on the feed.
pub async fn simulate_quake(
    State(state): State<AppState>,
    Json(body): Json<serde_json::Value>,
) -> HandlerResult<SimulateResponse> {
    let FeedMessage::QuakeReport(report) = FeedMessage::from_value(body)? else {
        return Err(AppError::BadRequest("Expected a quake report (code 551)".to_string()));
    };
    info!("Simulating quake report {}", report.identity());
    let update = state.monitor.inject_quake(report).await?;
    Ok(Json(update.into()))
}

/// POST /v1/simulate/alert
///
/// Replace the alert state with the given early warning, or clear it.
pub async fn simulate_alert(
    State(state): State<AppState>,
    Json(body): Json<SimulateAlertRequest>,
) -> HandlerResult<SimulateResponse> {
    let update = state.monitor.inject_alert(body.alert).await?;
    Ok(Json(update.into()))
}

// =============================================================================
// Speech proxy
// =============================================================================

/// POST /v1/voicevox
///
/// Synthesize `text` and return the audio as `audio/wav`.
pub async fn synthesize_speech(
    State(state): State<AppState>,
    Json(body): Json<SpeechRequest>,
) -> Result<Response, AppError> {
    let text = body.text.trim();
    if text.is_empty() {
        return Err(AppError::BadRequest("Text is required".to_string()));
    }

    let audio = state.tts.synthesize(text).await.map_err(|e| {
        warn!("Speech synthesis failed: {}", e);
        AppError::Internal("Error generating speech".to_string())
    })?;

    Ok(([(header::CONTENT_TYPE, "audio/wav")], Bytes::from(audio)).into_response())
}
