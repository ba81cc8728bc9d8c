//! Bounded, deduplicated history of quake reports.
//!
//! Entries are kept newest-first by occurrence time. After every mutation the
//! buffer is re-sorted, entries older than their window are pruned and the
//! count cap is applied, so the invariants hold between any two calls.
//!
//! Until the first live delivery the buffer holds only the startup snapshot
//! and uses the wider snapshot window. From the first live delivery on, every
//! entry is pruned against the live window, whatever its origin.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{parse_feed_time, window_cutoff, EventIdentity, QuakeReport};

crate::define_seq_type!(u64, ArrivalSeq);

/// Where a history entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryOrigin {
    Live,
    Bootstrap,
}

/// One quake report held by the buffer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub report: QuakeReport,
    /// Occurrence time used for ordering and windowing.
    pub occurred_at: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
    /// Arrival sequence of the first delivery of this identity.
    pub arrival: ArrivalSeq,
    pub origin: EntryOrigin,
}

impl HistoryEntry {
    /// Build an entry, stamping unparseable occurrence times with the
    /// receipt time.
    pub fn new(
        report: QuakeReport,
        received_at: DateTime<Utc>,
        arrival: ArrivalSeq,
        origin: EntryOrigin,
    ) -> Self {
        let occurred_at = occurrence_time(&report).unwrap_or(received_at);
        Self {
            report,
            occurred_at,
            received_at,
            arrival,
            origin,
        }
    }

    pub fn identity(&self) -> EventIdentity {
        self.report.identity()
    }
}

/// Occurrence time of a report: the message timestamp, or the
/// earthquake's own time when the former does not parse.
pub fn occurrence_time(report: &QuakeReport) -> Option<DateTime<Utc>> {
    parse_feed_time(&report.time).or_else(|| {
        report
            .earthquake
            .time
            .as_deref()
            .and_then(parse_feed_time)
    })
}

/// Size and age limits of a [`HistoryBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryLimits {
    pub max_entries: usize,
    pub live_window_days: u32,
    pub bootstrap_window_days: u32,
}


impl Default for HistoryLimits {
    fn default() -> Self {
        Self {
            max_entries: 30,
            live_window_days: 2,
            bootstrap_window_days: 15,
        }
    }
}

/// Result of inserting into the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    /// A new identity was added.
    Added,
    /// An existing entry with the same identity was replaced.
    Replaced,
    /// The buffer already held the identity and kept its entry.
    Kept,
}

#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    entries: Vec<HistoryEntry>,
    limits: HistoryLimits,
    live_started: bool,
}

impl HistoryBuffer {
    pub fn new(limits: HistoryLimits) -> Self {
        Self {
            entries: Vec::new(),
            limits,
            live_started: false,
        }
    }

    pub fn limits(&self) -> HistoryLimits {
        self.limits
    }

    /// Whether any live delivery has been inserted yet.
    pub fn live_started(&self) -> bool {
        self.live_started
    }

    /// Age window currently enforced on every entry.
    pub fn window_days(&self) -> u32 {
        if self.live_started {
            self.limits.live_window_days
        } else {
            self.limits.bootstrap_window_days
        }
    }

    /// Insert a live entry. A live delivery always replaces an entry with
    /// the same identity, keeping the original arrival sequence.
    pub fn upsert_live(&mut self, mut entry: HistoryEntry, now: DateTime<Utc>) -> Insertion {
        entry.origin = EntryOrigin::Live;
        self.live_started = true;
        let identity = entry.identity();
        let outcome = match self.position(&identity) {
            Some(idx) => {
                entry.arrival = self.entries[idx].arrival;
                self.entries[idx] = entry;
                Insertion::Replaced
            }
            None => {
                self.entries.push(entry);
                Insertion::Added
            }
        };
        self.enforce(now);
        outcome
    }

    /// Insert a bootstrap entry unless the identity is already present.
    pub fn insert_bootstrap(&mut self, mut entry: HistoryEntry, now: DateTime<Utc>) -> Insertion {
        entry.origin = EntryOrigin::Bootstrap;
        if self.position(&entry.identity()).is_some() {
            return Insertion::Kept;
        }
        self.entries.push(entry);
        self.enforce(now);
        Insertion::Added
    }

    /// Re-sort, prune by window and apply the count cap.
    pub fn enforce(&mut self, now: DateTime<Utc>) {
        let cutoff = window_cutoff(now, self.window_days());
        self.entries.retain(|entry| entry.occurred_at >= cutoff);
        self.entries.sort_by(|a, b| {
            b.occurred_at
                .cmp(&a.occurred_at)
                .then_with(|| b.arrival.cmp(&a.arrival))
        });
        self.entries.truncate(self.limits.max_entries);
    }

    pub fn get(&self, identity: &EventIdentity) -> Option<&HistoryEntry> {
        self.position(identity).map(|idx| &self.entries[idx])
    }

    pub fn contains(&self, identity: &EventIdentity) -> bool {
        self.position(identity).is_some()
    }

    /// Newest entry by occurrence time.
    pub fn newest(&self) -> Option<&HistoryEntry> {
        self.entries.first()
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, identity: &EventIdentity) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.report.time == identity.as_str())
    }
}

#[cfg(test)]
#[path = "history_tests.rs"]
mod history_tests;
