//! Shared feed state.
//!
//! [`FeedStore`] is the single owner of everything the live feed and the
//! startup snapshot produce: the history buffer, the latest quake report,
//! the current early warning and the last station-intensity message. The
//! connection task and the bootstrap task write to it; the display loop and
//! the HTTP layer read from it.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use super::history::{
    ArrivalSeq, EntryOrigin, HistoryBuffer, HistoryEntry, HistoryLimits, Insertion,
};
use crate::error::MonitorResult;
use crate::models::{EarlyWarning, EventIdentity, FeedMessage, QuakeReport, StationIntensity};

/// Number of identities remembered for latest-event decisions.
const SEEN_IDENTITY_CAPACITY: usize = 512;

/// The most recently arrived quake report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestQuake {
    pub report: QuakeReport,
    pub arrival: ArrivalSeq,
}

impl LatestQuake {
    pub fn identity(&self) -> EventIdentity {
        self.report.identity()
    }
}

/// What applying one message changed.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedUpdate {
    Quake {
        identity: EventIdentity,
        /// First delivery of this identity.
        first_arrival: bool,
        /// The report that became the latest quake with this message.
        new_latest: Option<QuakeReport>,
    },
    /// The alert state was replaced (`None` when cleared).
    Alert { identity: Option<EventIdentity> },
    StationIntensity { identity: EventIdentity },
    /// The startup snapshot was merged.
    Bootstrapped {
        merged: usize,
        new_latest: Option<QuakeReport>,
    },
    /// The message could not be used and was discarded.
    Dropped { reason: String },
}

impl FeedUpdate {
    /// The report this update made the latest quake, if any. Each latest
    /// transition is carried by exactly one update, so consumers that fall
    /// behind the store still see every transition.
    pub fn new_latest(&self) -> Option<&QuakeReport> {
        match self {
            FeedUpdate::Quake { new_latest, .. } | FeedUpdate::Bootstrapped { new_latest, .. } => {
                new_latest.as_ref()
            }
            _ => None,
        }
    }

    pub fn latest_changed(&self) -> bool {
        self.new_latest().is_some()
    }
}

/// Bounded FIFO set of identities that have been delivered at least once.
#[derive(Debug, Default)]
struct SeenIdentities {
    order: VecDeque<EventIdentity>,
    members: HashSet<EventIdentity>,
}

impl SeenIdentities {
    /// Record an identity; returns `true` when it was not already known.
    fn insert(&mut self, identity: EventIdentity) -> bool {
        if self.members.contains(&identity) {
            return false;
        }
        if self.order.len() == SEEN_IDENTITY_CAPACITY {
            if let Some(evicted) = self.order.pop_front() {
                self.members.remove(&evicted);
            }
        }
        self.members.insert(identity.clone());
        self.order.push_back(identity);
        true
    }
}

#[derive(Debug)]
struct FeedState {
    history: HistoryBuffer,
    latest: Option<LatestQuake>,
    alert: Option<EarlyWarning>,
    last_station: Option<StationIntensity>,
    seen: SeenIdentities,
    next_arrival: ArrivalSeq,
}

impl FeedState {
    fn take_arrival(&mut self) -> ArrivalSeq {
        let seq = self.next_arrival;
        self.next_arrival = seq.next();
        seq
    }
}

/// Cloneable handle to the shared feed state.
#[derive(Debug, Clone)]
pub struct FeedStore {
    inner: Arc<RwLock<FeedState>>,
}

impl FeedStore {
    pub fn new(limits: HistoryLimits) -> Self {
        Self {
            inner: Arc::new(RwLock::new(FeedState {
                history: HistoryBuffer::new(limits),
                latest: None,
                alert: None,
                last_station: None,
                seen: SeenIdentities::default(),
                next_arrival: ArrivalSeq::default(),
            })),
        }
    }

    /// Parse a raw frame and apply it. Unusable frames are logged and
    /// reported as [`FeedUpdate::Dropped`].
    pub fn apply_text(&self, text: &str, now: DateTime<Utc>) -> FeedUpdate {
        match FeedMessage::parse(text) {
            Ok(message) => self.apply(message, now),
            Err(e) => {
                log::warn!("Dropping feed message: {}", e);
                FeedUpdate::Dropped {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Apply one classified message in receipt order.
    pub fn apply(&self, message: FeedMessage, now: DateTime<Utc>) -> FeedUpdate {
        let mut state = self.inner.write();
        match message {
            FeedMessage::QuakeReport(report) => {
                let identity = report.identity();
                let arrival = state.take_arrival();
                let first_arrival = state.seen.insert(identity.clone());

                let entry = HistoryEntry::new(report.clone(), now, arrival, EntryOrigin::Live);
                let insertion = state.history.upsert_live(entry, now);

                let new_latest = if first_arrival {
                    state.latest = Some(LatestQuake {
                        report: report.clone(),
                        arrival,
                    });
                    Some(report)
                } else {
                    if let Some(latest) = state.latest.as_mut() {
                        if latest.report.time == report.time {
                            latest.report = report;
                        }
                    }
                    None
                };

                log::debug!(
                    "Quake report {} applied ({:?}, first_arrival={})",
                    identity,
                    insertion,
                    first_arrival
                );
                FeedUpdate::Quake {
                    identity,
                    first_arrival,
                    new_latest,
                }
            }
            FeedMessage::EarlyWarning(alert) => {
                let identity = alert.identity();
                log::info!(
                    "Early warning {} (report #{}, final={})",
                    identity,
                    alert.report_num,
                    alert.is_final
                );
                state.alert = Some(alert);
                FeedUpdate::Alert {
                    identity: Some(identity),
                }
            }
            FeedMessage::StationIntensity(station) => {
                let identity = EventIdentity::new(station.time.clone());
                log::debug!(
                    "Station intensity {} with {} points",
                    identity,
                    station.points.len()
                );
                state.last_station = Some(station);
                FeedUpdate::StationIntensity { identity }
            }
        }
    }

    /// Merge startup snapshot reports without overwriting live data.
    ///
    /// When no live report has arrived yet, the newest merged report becomes
    /// the latest quake.
    pub fn merge_bootstrap(&self, reports: Vec<QuakeReport>, now: DateTime<Utc>) -> FeedUpdate {
        let mut state = self.inner.write();
        let mut merged = 0;

        for report in reports {
            let arrival = state.take_arrival();
            state.seen.insert(report.identity());
            let entry = HistoryEntry::new(report, now, arrival, EntryOrigin::Bootstrap);
            if state.history.insert_bootstrap(entry, now) == Insertion::Added {
                merged += 1;
            }
        }

        let mut new_latest = None;
        if state.latest.is_none() {
            let newest = state.history.newest().map(|entry| LatestQuake {
                report: entry.report.clone(),
                arrival: entry.arrival,
            });
            new_latest = newest.as_ref().map(|latest| latest.report.clone());
            state.latest = newest;
        }

        log::info!(
            "Merged {} bootstrap reports ({} entries held)",
            merged,
            state.history.len()
        );
        FeedUpdate::Bootstrapped {
            merged,
            new_latest,
        }
    }

    /// Replace the alert state wholesale. `None` clears it.
    pub fn set_alert(&self, alert: Option<EarlyWarning>) -> FeedUpdate {
        let identity = alert.as_ref().map(EarlyWarning::identity);
        self.inner.write().alert = alert;
        FeedUpdate::Alert { identity }
    }

    /// Clear the alert state. Returns whether an alert was present.
    pub fn dismiss_alert(&self) -> bool {
        self.inner.write().alert.take().is_some()
    }

    pub fn latest(&self) -> Option<LatestQuake> {
        self.inner.read().latest.clone()
    }

    pub fn alert(&self) -> Option<EarlyWarning> {
        self.inner.read().alert.clone()
    }

    pub fn last_station_intensity(&self) -> Option<StationIntensity> {
        self.inner.read().last_station.clone()
    }

    /// Snapshot of the history buffer, newest first.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.inner.read().history.entries().to_vec()
    }

    pub fn history_len(&self) -> usize {
        self.inner.read().history.len()
    }

    pub fn find(&self, identity: &EventIdentity) -> Option<HistoryEntry> {
        self.inner.read().history.get(identity).cloned()
    }

    /// The buffered reports as a JSON array in feed shape, newest first.
    pub fn export_history_json(&self) -> MonitorResult<String> {
        let state = self.inner.read();
        let reports: Vec<&QuakeReport> = state.history.iter().map(|e| &e.report).collect();
        Ok(serde_json::to_string_pretty(&reports)?)
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod store_tests;
