//! Feed timestamp handling.
//!
//! The quake feed stamps every message with a Japan Standard Time wall-clock
//! string such as `2024/01/01 16:10:09.123`. Retention windows are computed in
//! the same zone: "N days" means "since midnight JST, N calendar days ago".

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};

/// Offset of Japan Standard Time from UTC.
pub const JST_OFFSET_SECS: i32 = 9 * 3600;

/// Wall-clock formats used by the feed, most specific first.
const FEED_TIME_FORMATS: &[&str] = &[
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// Output format used when the monitor has to synthesize a feed timestamp.
pub const FEED_TIME_OUTPUT_FORMAT: &str = "%Y/%m/%d %H:%M:%S%.3f";

/// The feed's time zone.
pub fn jst() -> FixedOffset {
    FixedOffset::east_opt(JST_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Parse a feed timestamp into UTC.
///
/// Accepts the feed's JST wall-clock format and RFC 3339. Returns `None`
/// for anything else.
pub fn parse_feed_time(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    FEED_TIME_FORMATS.iter().find_map(|fmt| {
        NaiveDateTime::parse_from_str(trimmed, fmt)
            .ok()
            .and_then(|naive| jst().from_local_datetime(&naive).single())
            .map(|dt| dt.with_timezone(&Utc))
    })
}

/// Render a UTC instant the way the feed writes its timestamps.
pub fn format_feed_time(dt: DateTime<Utc>) -> String {
    dt.with_timezone(&jst())
        .format(FEED_TIME_OUTPUT_FORMAT)
        .to_string()
}

/// Earliest instant retained by a window of `days` calendar days.
///
/// The cutoff is midnight JST of the day `days` days before `now`, so a
/// two-day window evaluated at 10:00 on the 3rd keeps everything since
/// 00:00 on the 1st.
pub fn window_cutoff(now: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    let zone = jst();
    let start_day = now.with_timezone(&zone).date_naive() - Duration::days(i64::from(days));

    start_day
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| zone.from_local_datetime(&midnight).single())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| now - Duration::days(i64::from(days)))
}
