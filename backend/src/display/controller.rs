//! Decides what the display shows.
//!
//! The controller follows the live latest quake until a history entry is
//! selected. A selection pins that entry for a fixed number of ticks, after
//! which the view reverts to whatever is latest at that moment. New live
//! data never interrupts a pin. The early-warning overlay is independent
//! of both modes.
//!
//! The controller holds no timers itself. The caller starts one tick
//! source per [`TimerGeneration`] returned by [`DisplayController::select`]
//! and feeds the ticks back through [`DisplayController::tick`].

use super::countdown::TimerGeneration;
use super::view::{AlertView, DisplaySnapshot, DisplaySource, QuakeView, RecentEntry};
use crate::config::DisplaySettings;
use crate::feed::HistoryEntry;
use crate::geocode::IntensityMarker;
use crate::models::{EarlyWarning, EventIdentity, QuakeReport};

#[derive(Debug, Clone, PartialEq)]
pub enum DisplayMode {
    Live,
    Pinned { report: QuakeReport, remaining: u32 },
}

/// Result of feeding one countdown tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not pinned, or the tick came from a replaced timer.
    Ignored,
    Remaining(u32),
    /// The pin ran out and the view is live again. The caller stops its timer.
    Expired,
}

#[derive(Debug, Clone)]
pub struct DisplayController {
    pin_seconds: u32,
    recent_limit: usize,
    mode: DisplayMode,
    generation: TimerGeneration,
    live: Option<QuakeReport>,
    alert: Option<EarlyWarning>,
    recent: Vec<RecentEntry>,
    markers: Option<(EventIdentity, Vec<IntensityMarker>)>,
}

impl DisplayController {
    pub fn new(pin_seconds: u32, recent_limit: usize) -> Self {
        Self {
            pin_seconds,
            recent_limit,
            mode: DisplayMode::Live,
            generation: TimerGeneration::default(),
            live: None,
            alert: None,
            recent: Vec::new(),
            markers: None,
        }
    }

    pub fn from_settings(settings: &DisplaySettings) -> Self {
        Self::new(settings.pin_seconds, settings.recent_limit)
    }

    pub fn mode(&self) -> &DisplayMode {
        &self.mode
    }

    pub fn is_pinned(&self) -> bool {
        matches!(self.mode, DisplayMode::Pinned { .. })
    }

    pub fn remaining(&self) -> Option<u32> {
        match &self.mode {
            DisplayMode::Pinned { remaining, .. } => Some(*remaining),
            DisplayMode::Live => None,
        }
    }

    /// Generation of the most recent selection.
    pub fn generation(&self) -> TimerGeneration {
        self.generation
    }

    /// Record the current latest quake. Returns true when this changes what
    /// is displayed, which only happens while live.
    pub fn on_latest_changed(&mut self, latest: Option<&QuakeReport>) -> bool {
        if self.live.as_ref() == latest {
            return false;
        }
        self.live = latest.cloned();
        !self.is_pinned()
    }

    /// Replace the recent-quakes list from history, newest first.
    pub fn set_recent(&mut self, history: &[HistoryEntry]) {
        self.recent = history
            .iter()
            .take(self.recent_limit)
            .map(RecentEntry::from_entry)
            .collect();
    }

    /// Pin `report`, restarting the countdown. The caller must start a tick
    /// source for the returned generation and drop the previous one.
    pub fn select(&mut self, report: QuakeReport) -> TimerGeneration {
        self.generation = self.generation.next();
        log::debug!(
            "Pinning {} for {}s (generation {})",
            report.identity(),
            self.pin_seconds,
            self.generation
        );
        self.mode = DisplayMode::Pinned {
            report,
            remaining: self.pin_seconds,
        };
        self.generation
    }

    pub fn tick(&mut self, generation: TimerGeneration) -> TickOutcome {
        if generation != self.generation {
            return TickOutcome::Ignored;
        }
        let DisplayMode::Pinned { remaining, .. } = &mut self.mode else {
            return TickOutcome::Ignored;
        };

        *remaining = remaining.saturating_sub(1);
        if *remaining > 0 {
            return TickOutcome::Remaining(*remaining);
        }

        self.mode = DisplayMode::Live;
        log::debug!("Pin expired, back to live");
        TickOutcome::Expired
    }

    /// Replace the overlay wholesale; `None` clears it.
    pub fn set_alert(&mut self, alert: Option<EarlyWarning>) {
        self.alert = alert;
    }

    /// Hide the overlay. Returns whether one was showing.
    pub fn dismiss_alert(&mut self) -> bool {
        self.alert.take().is_some()
    }

    pub fn alert(&self) -> Option<&EarlyWarning> {
        self.alert.as_ref()
    }

    /// The report currently on screen.
    pub fn displayed_report(&self) -> Option<&QuakeReport> {
        match &self.mode {
            DisplayMode::Pinned { report, .. } => Some(report),
            DisplayMode::Live => self.live.as_ref(),
        }
    }

    pub fn displayed_identity(&self) -> Option<EventIdentity> {
        self.displayed_report().map(QuakeReport::identity)
    }

    /// Attach resolved markers for `identity`. Markers for a report that is
    /// no longer displayed are discarded.
    pub fn set_markers(&mut self, identity: EventIdentity, markers: Vec<IntensityMarker>) -> bool {
        if self.displayed_identity().as_ref() != Some(&identity) {
            log::debug!("Discarding markers for {}, no longer displayed", identity);
            return false;
        }
        self.markers = Some((identity, markers));
        true
    }

    fn displayed_markers(&self) -> Vec<IntensityMarker> {
        match (&self.markers, self.displayed_identity()) {
            (Some((identity, markers)), Some(displayed)) if *identity == displayed => markers.clone(),
            _ => Vec::new(),
        }
    }

    pub fn snapshot(&self) -> DisplaySnapshot {
        let (source, remaining_seconds) = match &self.mode {
            DisplayMode::Live => (DisplaySource::Live, None),
            DisplayMode::Pinned { remaining, .. } => (DisplaySource::Pinned, Some(*remaining)),
        };
        let quake = self
            .displayed_report()
            .map(QuakeView::from_report)
            .unwrap_or_else(QuakeView::placeholder);

        DisplaySnapshot {
            source,
            remaining_seconds,
            quake,
            alert_visible: self.alert.is_some(),
            alert: self.alert.as_ref().map(AlertView::from_warning),
            markers: self.displayed_markers(),
            recent: self.recent.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn quake(time: &str, scale: i32) -> QuakeReport {
        serde_json::from_value(json!({
            "code": 551,
            "time": time,
            "earthquake": {"maxScale": scale, "hypocenter": {"name": "テスト", "magnitude": 4.0}}
        }))
        .unwrap()
    }

    fn alert(time: &str) -> EarlyWarning {
        serde_json::from_value(json!({
            "code": 556,
            "time": time,
            "issue": {"time": time},
            "earthquake": {"hypocenter": {"name": "茨城県沖"}}
        }))
        .unwrap()
    }

    fn marker(addr: &str) -> IntensityMarker {
        IntensityMarker {
            addr: addr.to_string(),
            pref: "東京都".to_string(),
            scale: 30,
            intensity_label: "3",
            is_area: false,
            latitude: 35.6,
            longitude: 139.7,
        }
    }

    #[test]
    fn test_starts_live_with_placeholder() {
        let controller = DisplayController::new(15, 30);
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.source, DisplaySource::Live);
        assert!(snapshot.quake.is_placeholder());
        assert!(!snapshot.alert_visible);
    }

    #[test]
    fn test_live_follows_latest() {
        let mut controller = DisplayController::new(15, 30);
        assert!(controller.on_latest_changed(Some(&quake("2024/01/01 10:00:00", 30))));
        assert!(!controller.on_latest_changed(Some(&quake("2024/01/01 10:00:00", 30))));
        assert_eq!(
            controller.snapshot().quake.identity,
            Some(EventIdentity::new("2024/01/01 10:00:00"))
        );
    }

    #[test]
    fn test_pin_reverts_after_countdown() {
        let mut controller = DisplayController::new(15, 30);
        controller.on_latest_changed(Some(&quake("L1", 30)));
        let generation = controller.select(quake("H1", 40));
        assert_eq!(controller.snapshot().remaining_seconds, Some(15));

        for expected in (1..15).rev() {
            assert_eq!(controller.tick(generation), TickOutcome::Remaining(expected));
        }
        assert_eq!(controller.tick(generation), TickOutcome::Expired);

        let snapshot = controller.snapshot();
        assert_eq!(snapshot.source, DisplaySource::Live);
        assert_eq!(snapshot.quake.identity, Some(EventIdentity::new("L1")));
        assert_eq!(controller.tick(generation), TickOutcome::Ignored);
    }

    #[test]
    fn test_reverts_to_latest_at_expiry_time() {
        let mut controller = DisplayController::new(2, 30);
        controller.on_latest_changed(Some(&quake("L1", 30)));
        let generation = controller.select(quake("H1", 40));

        assert!(!controller.on_latest_changed(Some(&quake("L2", 50))));
        assert_eq!(controller.snapshot().quake.identity, Some(EventIdentity::new("H1")));

        controller.tick(generation);
        assert_eq!(controller.tick(generation), TickOutcome::Expired);
        assert_eq!(controller.snapshot().quake.identity, Some(EventIdentity::new("L2")));
    }

    #[test]
    fn test_reselect_resets_countdown_and_retires_old_ticks() {
        let mut controller = DisplayController::new(15, 30);
        let first = controller.select(quake("H1", 30));
        for _ in 0..5 {
            controller.tick(first);
        }
        assert_eq!(controller.remaining(), Some(10));

        let second = controller.select(quake("H2", 40));
        assert_ne!(first, second);
        assert_eq!(controller.remaining(), Some(15));

        assert_eq!(controller.tick(first), TickOutcome::Ignored);
        assert_eq!(controller.tick(second), TickOutcome::Remaining(14));
        assert_eq!(controller.remaining(), Some(14));
    }

    #[test]
    fn test_alert_is_orthogonal_to_pin() {
        let mut controller = DisplayController::new(15, 30);
        let generation = controller.select(quake("H1", 30));
        controller.tick(generation);

        controller.set_alert(Some(alert("A1")));
        let snapshot = controller.snapshot();
        assert!(snapshot.alert_visible);
        assert_eq!(snapshot.source, DisplaySource::Pinned);
        assert_eq!(snapshot.remaining_seconds, Some(14));

        assert!(controller.dismiss_alert());
        let snapshot = controller.snapshot();
        assert!(!snapshot.alert_visible);
        assert_eq!(snapshot.remaining_seconds, Some(14));
        assert!(!controller.dismiss_alert());
    }

    #[test]
    fn test_markers_follow_displayed_report() {
        let mut controller = DisplayController::new(15, 30);
        controller.on_latest_changed(Some(&quake("L1", 30)));

        assert!(!controller.set_markers(EventIdentity::new("other"), vec![marker("a")]));
        assert!(controller.set_markers(EventIdentity::new("L1"), vec![marker("新宿区")]));
        assert_eq!(controller.snapshot().markers.len(), 1);

        controller.select(quake("H1", 40));
        assert!(controller.snapshot().markers.is_empty());
    }

    #[test]
    fn test_recent_list_is_capped() {
        use crate::feed::{ArrivalSeq, EntryOrigin};
        use chrono::Utc;

        let now = Utc::now();
        let entries: Vec<HistoryEntry> = (0..5)
            .map(|i| {
                HistoryEntry::new(
                    quake(&format!("2024/01/01 10:0{}:00", 4 - i), 30),
                    now,
                    ArrivalSeq::new(i as u64),
                    EntryOrigin::Live,
                )
            })
            .collect();

        let mut controller = DisplayController::new(15, 3);
        controller.set_recent(&entries);
        let recent = controller.snapshot().recent;
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].identity, EventIdentity::new("2024/01/01 10:04:00"));
    }
}
