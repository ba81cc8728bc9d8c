//! Feed message model.
//!
//! The feed multiplexes several message kinds over one stream, distinguished
//! by a numeric `code` field:
//!
//! | code | kind                | handled as                         |
//! |------|---------------------|------------------------------------|
//! | 551  | quake report        | history + latest event             |
//! | 556  | early warning (EEW) | replaces the alert state           |
//! | 555  | station intensity   | recorded, not displayed            |
//!
//! Field names follow the feed's JSON so that a stored report serializes back
//! into the shape it arrived in. Unknown fields are preserved in `extra`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::intensity::{SeismicIntensity, TsunamiStatus};
use crate::error::{ErrorContext, MonitorError, MonitorResult};

/// Discriminant of quake report messages.
pub const CODE_QUAKE_REPORT: u64 = 551;
/// Discriminant of station intensity messages.
pub const CODE_STATION_INTENSITY: u64 = 555;
/// Discriminant of early warning messages.
pub const CODE_EARLY_WARNING: u64 = 556;

/// Kind of a feed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    QuakeReport,
    EarlyWarning,
    StationIntensity,
}

impl EventKind {
    /// Map a numeric discriminant to its kind.
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            CODE_QUAKE_REPORT => Some(Self::QuakeReport),
            CODE_EARLY_WARNING => Some(Self::EarlyWarning),
            CODE_STATION_INTENSITY => Some(Self::StationIntensity),
            _ => None,
        }
    }

    /// Numeric discriminant of this kind.
    pub fn code(&self) -> u64 {
        match self {
            Self::QuakeReport => CODE_QUAKE_REPORT,
            Self::EarlyWarning => CODE_EARLY_WARNING,
            Self::StationIntensity => CODE_STATION_INTENSITY,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::QuakeReport => "quake_report",
            Self::EarlyWarning => "early_warning",
            Self::StationIntensity => "station_intensity",
        }
    }
}

/// Stable key of a logical event: the occurrence timestamp string exactly as
/// the feed sent it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventIdentity(String);

impl EventIdentity {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EventIdentity {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Build coordinates, rejecting the feed's "unknown" sentinels (-200),
    /// zeros and anything outside the valid range.
    pub fn checked(latitude: Option<f64>, longitude: Option<f64>) -> Option<Self> {
        let (latitude, longitude) = (latitude?, longitude?);
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && latitude != 0.0
            && longitude != 0.0
            && latitude.abs() <= 90.0
            && longitude.abs() <= 180.0;
        valid.then_some(Self {
            latitude,
            longitude,
        })
    }
}

// =============================================================================
// Quake report (551)
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hypocenter {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub depth: Option<f64>,
    #[serde(default)]
    pub magnitude: Option<f64>,
}

impl Hypocenter {
    pub fn coordinates(&self) -> Option<Coordinates> {
        Coordinates::checked(self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuakeDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default)]
    pub max_scale: Option<i32>,
    #[serde(default)]
    pub domestic_tsunami: TsunamiStatus,
    #[serde(default)]
    pub hypocenter: Hypocenter,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Observed intensity for one municipality or area.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntensityPoint {
    pub addr: String,
    #[serde(default)]
    pub is_area: bool,
    #[serde(default)]
    pub pref: String,
    #[serde(default)]
    pub scale: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comments {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free_form_comment: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Finalised earthquake observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuakeReport {
    #[serde(default = "quake_report_code")]
    pub code: u64,
    pub time: String,
    pub earthquake: QuakeDetail,
    #[serde(default)]
    pub points: Vec<IntensityPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<Comments>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn quake_report_code() -> u64 {
    CODE_QUAKE_REPORT
}

impl QuakeReport {
    pub fn identity(&self) -> EventIdentity {
        EventIdentity::new(self.time.clone())
    }

    pub fn max_intensity(&self) -> SeismicIntensity {
        SeismicIntensity::from_scale(self.earthquake.max_scale.unwrap_or(0))
    }

    pub fn magnitude(&self) -> f64 {
        self.earthquake.hypocenter.magnitude.unwrap_or(0.0)
    }

    pub fn depth(&self) -> f64 {
        self.earthquake.hypocenter.depth.unwrap_or(0.0)
    }

    pub fn free_form_comment(&self) -> Option<&str> {
        self.comments
            .as_ref()
            .and_then(|c| c.free_form_comment.as_deref())
            .filter(|c| !c.trim().is_empty())
    }
}

// =============================================================================
// Early warning (556)
// =============================================================================

/// Per-region forecast inside an early warning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastRegion {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub forecast_intensity: String,
    #[serde(default)]
    pub is_warning: bool,
}

/// Provisional, time-critical forecast issued before or at the onset of
/// strong shaking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EarlyWarning {
    #[serde(default = "early_warning_code")]
    pub code: u64,
    pub time: String,
    #[serde(rename = "type", default)]
    pub warning_type: String,
    #[serde(default)]
    pub report_id: String,
    #[serde(default)]
    pub report_num: u32,
    #[serde(default)]
    pub report_time: String,
    #[serde(default)]
    pub region_name: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub is_training: bool,
    #[serde(default)]
    pub depth: Option<f64>,
    #[serde(default)]
    pub magnitude: Option<f64>,
    #[serde(default)]
    pub forecast_max_intensity: String,
    #[serde(default)]
    pub forecast_max_lpgm_intensity: String,
    #[serde(default)]
    pub regions: Vec<ForecastRegion>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn early_warning_code() -> u64 {
    CODE_EARLY_WARNING
}

impl EarlyWarning {
    pub fn identity(&self) -> EventIdentity {
        EventIdentity::new(self.time.clone())
    }

    pub fn epicenter(&self) -> Option<Coordinates> {
        Coordinates::checked(self.latitude, self.longitude)
    }
}

// =============================================================================
// Station intensity (555)
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StationPoint {
    #[serde(default)]
    pub pref: String,
    #[serde(default)]
    pub addr: String,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
    #[serde(default)]
    pub scale: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationIntensity {
    #[serde(default = "station_intensity_code")]
    pub code: u64,
    pub time: String,
    #[serde(default)]
    pub points: Vec<StationPoint>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn station_intensity_code() -> u64 {
    CODE_STATION_INTENSITY
}

// =============================================================================
// Envelope
// =============================================================================

/// One classified feed message.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedMessage {
    QuakeReport(QuakeReport),
    EarlyWarning(EarlyWarning),
    StationIntensity(StationIntensity),
}

impl FeedMessage {
    /// Parse a raw text frame.
    ///
    /// # Errors
    /// * `MalformedPayload` if the text is not JSON, lacks a numeric `code`,
    ///   or misses fields its kind requires
    /// * `UnsupportedEvent` for codes other than 551/555/556
    pub fn parse(text: &str) -> MonitorResult<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(MonitorError::from)
            .map_err(|e| e.with_operation("parse_feed_message"))?;
        Self::from_value(value)
    }

    /// Classify an already-decoded JSON value.
    pub fn from_value(value: Value) -> MonitorResult<Self> {
        let code = value.get("code").and_then(Value::as_u64).ok_or_else(|| {
            MonitorError::malformed_with_context(
                "missing numeric 'code' discriminant",
                ErrorContext::new("parse_feed_message"),
            )
        })?;

        let kind = EventKind::from_code(code).ok_or_else(|| {
            MonitorError::unsupported(format!("event code {}", code))
                .with_operation("parse_feed_message")
        })?;

        let context = || {
            ErrorContext::new("parse_feed_message").with_entity(kind.as_str())
        };

        match kind {
            EventKind::QuakeReport => serde_json::from_value(value)
                .map(FeedMessage::QuakeReport)
                .map_err(|e| MonitorError::malformed_with_context(e.to_string(), context())),
            EventKind::EarlyWarning => serde_json::from_value(value)
                .map(FeedMessage::EarlyWarning)
                .map_err(|e| MonitorError::malformed_with_context(e.to_string(), context())),
            EventKind::StationIntensity => serde_json::from_value(value)
                .map(FeedMessage::StationIntensity)
                .map_err(|e| MonitorError::malformed_with_context(e.to_string(), context())),
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::QuakeReport(_) => EventKind::QuakeReport,
            Self::EarlyWarning(_) => EventKind::EarlyWarning,
            Self::StationIntensity(_) => EventKind::StationIntensity,
        }
    }

    /// Raw occurrence timestamp of the message.
    pub fn time(&self) -> &str {
        match self {
            Self::QuakeReport(r) => &r.time,
            Self::EarlyWarning(w) => &w.time,
            Self::StationIntensity(s) => &s.time,
        }
    }

    pub fn identity(&self) -> EventIdentity {
        EventIdentity::new(self.time())
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod event_tests;
