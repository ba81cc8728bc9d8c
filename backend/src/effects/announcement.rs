//! Announcement text and the notification cue.

use async_trait::async_trait;
use std::io::Write;

use super::{EffectCategory, SideEffect};
use crate::error::{MonitorError, MonitorResult};
use crate::models::QuakeReport;

/// Spoken fallback when the epicenter is not named.
const UNKNOWN_LOCATION: &str = "不明";

/// Compose the Japanese announcement for a quake report.
pub fn announcement_text(report: &QuakeReport) -> String {
    let hypocenter = &report.earthquake.hypocenter;
    let location = if hypocenter.name.trim().is_empty() {
        UNKNOWN_LOCATION
    } else {
        hypocenter.name.as_str()
    };

    let mut text = format!(
        "地震情報。最大震度{}の地震が発生しました。規模はマグニチュード{:.1}、震源地は{}です。{}",
        report.max_intensity().label(),
        report.magnitude(),
        location,
        report.earthquake.domestic_tsunami.announcement(),
    );

    if let Some(comment) = report.free_form_comment() {
        text.push_str(" 特異事項および伝達事項が届きました。内容は次のとおりです。 ");
        text.push_str(comment.trim());
    }
    text
}

/// Short audible cue played ahead of the spoken announcement.
///
/// Rings the terminal bell on stdout.
#[derive(Debug, Default)]
pub struct SoundCue;

impl SoundCue {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SideEffect for SoundCue {
    fn category(&self) -> EffectCategory {
        EffectCategory::NotificationSound
    }

    async fn fire(&self, report: &QuakeReport) -> MonitorResult<()> {
        log::info!(
            "New quake report {}: max intensity {}",
            report.identity(),
            report.max_intensity().label()
        );
        ring_bell().map_err(|e| MonitorError::side_effect(format!("notification cue failed: {}", e)))
    }
}

fn ring_bell() -> std::io::Result<()> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(b"\x07")?;
    stdout.flush()
}
