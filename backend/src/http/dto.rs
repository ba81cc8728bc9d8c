//! Data Transfer Objects for the HTTP API.
//!
//! Display payloads are served as-is from [`crate::display`]; only the
//! request bodies and list/acknowledgement responses live here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::feed::{ConnectionStatsSnapshot, EntryOrigin, FeedUpdate, HistoryEntry};
use crate::models::{EarlyWarning, EventIdentity, QuakeReport};

pub use crate::display::{AlertView, DisplaySnapshot, QuakeView, RecentEntry};

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub history_entries: usize,
    pub feed: ConnectionStatsSnapshot,
}

/// One buffered history entry.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntryDto {
    pub identity: EventIdentity,
    pub occurred_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
    pub origin: EntryOrigin,
    pub report: QuakeReport,
}

impl From<HistoryEntry> for HistoryEntryDto {
    fn from(entry: HistoryEntry) -> Self {
        Self {
            identity: entry.report.identity(),
            occurred_at: entry.occurred_at,
            received_at: entry.received_at,
            origin: entry.origin,
            report: entry.report,
        }
    }
}

/// Response for listing the history buffer.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryListResponse {
    pub entries: Vec<HistoryEntryDto>,
    pub total: usize,
}

/// Response for dismissing the alert overlay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DismissResponse {
    /// Whether an alert was showing
    pub dismissed: bool,
}

/// Request body for a simulated early warning. A missing or null `alert`
/// clears the alert state.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimulateAlertRequest {
    #[serde(default)]
    pub alert: Option<EarlyWarning>,
}

/// What a simulated message changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulateResponse {
    pub identity: Option<EventIdentity>,
    pub first_arrival: bool,
    pub latest_changed: bool,
}

impl From<FeedUpdate> for SimulateResponse {
    fn from(update: FeedUpdate) -> Self {
        let latest_changed = update.latest_changed();
        match update {
            FeedUpdate::Quake {
                identity,
                first_arrival,
                ..
            } => Self {
                identity: Some(identity),
                first_arrival,
                latest_changed,
            },
            FeedUpdate::Alert { identity } => Self {
                identity,
                first_arrival: false,
                latest_changed,
            },
            FeedUpdate::StationIntensity { identity } => Self {
                identity: Some(identity),
                first_arrival: false,
                latest_changed,
            },
            FeedUpdate::Bootstrapped { .. } | FeedUpdate::Dropped { .. } => Self {
                identity: None,
                first_arrival: false,
                latest_changed,
            },
        }
    }
}

/// Request body for the speech proxy.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SpeechRequest {
    #[serde(default)]
    pub text: String,
}
