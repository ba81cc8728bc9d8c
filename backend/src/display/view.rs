//! View payloads rendered by a display client.

use serde::Serialize;

use crate::feed::HistoryEntry;
use crate::geocode::IntensityMarker;
use crate::models::{
    Coordinates, EarlyWarning, EventIdentity, ForecastRegion, IntensityPoint, QuakeReport,
    SeismicIntensity, TsunamiLevel,
};

/// The quake shown in the sidebar and on the map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuakeView {
    /// `None` for the empty placeholder.
    pub identity: Option<EventIdentity>,
    pub time: String,
    pub max_scale: i32,
    pub intensity: SeismicIntensity,
    pub intensity_label: &'static str,
    pub magnitude: f64,
    pub depth: f64,
    pub location: String,
    pub tsunami: TsunamiLevel,
    pub tsunami_banner: Option<&'static str>,
    pub epicenter: Option<Coordinates>,
    pub points: Vec<IntensityPoint>,
    pub comment: Option<String>,
}

impl QuakeView {
    pub fn from_report(report: &QuakeReport) -> Self {
        let intensity = report.max_intensity();
        let tsunami = report.earthquake.domestic_tsunami.level();
        Self {
            identity: Some(report.identity()),
            time: report.time.clone(),
            max_scale: report.earthquake.max_scale.unwrap_or(0),
            intensity,
            intensity_label: intensity.label(),
            magnitude: report.magnitude(),
            depth: report.depth(),
            location: report.earthquake.hypocenter.name.clone(),
            tsunami,
            tsunami_banner: tsunami.banner(),
            epicenter: report.earthquake.hypocenter.coordinates(),
            points: report.points.clone(),
            comment: report.free_form_comment().map(str::to_string),
        }
    }

    /// Shown while no quake report is known.
    pub fn placeholder() -> Self {
        let intensity = SeismicIntensity::Unknown;
        Self {
            identity: None,
            time: String::new(),
            max_scale: 0,
            intensity,
            intensity_label: intensity.label(),
            magnitude: 0.0,
            depth: 0.0,
            location: String::new(),
            tsunami: TsunamiLevel::None,
            tsunami_banner: None,
            epicenter: None,
            points: Vec::new(),
            comment: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.identity.is_none()
    }
}

/// Early-warning overlay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertView {
    pub identity: EventIdentity,
    pub time: String,
    pub report_type: String,
    pub report_num: u32,
    pub region_name: String,
    pub forecast_max_intensity: String,
    pub magnitude: Option<f64>,
    pub depth: Option<f64>,
    pub epicenter: Option<Coordinates>,
    pub is_final: bool,
    pub is_training: bool,
    pub regions: Vec<ForecastRegion>,
}

impl AlertView {
    pub fn from_warning(alert: &EarlyWarning) -> Self {
        Self {
            identity: alert.identity(),
            time: alert.time.clone(),
            report_type: alert.warning_type.clone(),
            report_num: alert.report_num,
            region_name: alert.region_name.clone(),
            forecast_max_intensity: alert.forecast_max_intensity.clone(),
            magnitude: alert.magnitude,
            depth: alert.depth,
            epicenter: alert.epicenter(),
            is_final: alert.is_final,
            is_training: alert.is_training,
            regions: alert.regions.clone(),
        }
    }
}

/// One row of the recent-quakes list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentEntry {
    pub identity: EventIdentity,
    pub time: String,
    pub location: String,
    pub depth: f64,
    pub magnitude: f64,
    pub max_scale: i32,
    pub intensity_label: &'static str,
    pub epicenter: Option<Coordinates>,
}

impl RecentEntry {
    pub fn from_entry(entry: &HistoryEntry) -> Self {
        let report = &entry.report;
        Self {
            identity: report.identity(),
            time: report.time.clone(),
            location: report.earthquake.hypocenter.name.clone(),
            depth: report.depth(),
            magnitude: report.magnitude(),
            max_scale: report.earthquake.max_scale.unwrap_or(0),
            intensity_label: report.max_intensity().label(),
            epicenter: report.earthquake.hypocenter.coordinates(),
        }
    }
}

/// Whether the display follows the feed or shows a selected entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplaySource {
    Live,
    Pinned,
}

/// Everything a display client needs to render one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplaySnapshot {
    pub source: DisplaySource,
    /// Seconds left before a pinned view reverts to live.
    pub remaining_seconds: Option<u32>,
    pub quake: QuakeView,
    pub alert_visible: bool,
    pub alert: Option<AlertView>,
    pub markers: Vec<IntensityMarker>,
    pub recent: Vec<RecentEntry>,
}
