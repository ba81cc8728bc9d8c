//! One-shot side effects fired for each newly observed quake report.

pub mod announcement;
pub mod dispatcher;
pub mod speech;

pub use announcement::{announcement_text, SoundCue};
pub use dispatcher::SideEffectDispatcher;
pub use speech::{SpeechAnnouncer, SpeechSynthesizer, VoicevoxClient};

use async_trait::async_trait;
use serde::Serialize;

use crate::error::MonitorResult;
use crate::models::QuakeReport;

/// Side-effect category. Each category has its own persisted marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectCategory {
    Announcement,
    NotificationSound,
}

impl EffectCategory {
    /// Key of the last-handled marker in the key/value store.
    pub fn marker_key(&self) -> &'static str {
        match self {
            Self::Announcement => "last_announced_event",
            Self::NotificationSound => "last_sound_event",
        }
    }
}

/// A fire-and-forget effect for one category.
#[async_trait]
pub trait SideEffect: Send + Sync {
    fn category(&self) -> EffectCategory;

    async fn fire(&self, report: &QuakeReport) -> MonitorResult<()>;
}
