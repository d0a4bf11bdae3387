//! Human-readable relative times ("In 3 days", "2 hours ago").

use chrono::{DateTime, Datelike, TimeDelta, Utc};

const UNITS: [(f64, &str); 7] = [
    (31_556_926.0, "year"),
    (2_629_743.83, "month"),
    (604_800.0, "week"),
    (86_400.0, "day"),
    (3_600.0, "hour"),
    (60.0, "minute"),
    (1.0, "second"),
];

/// Render a signed duration relative to now.
///
/// Positive durations lie in the future (`"In 2 weeks"`), negative ones in
/// the past (`"2 weeks ago"`). The largest unit with a whole count of at
/// least one wins. Anything under one second is `"Now"`.
pub fn relative_time(delta: TimeDelta) -> String {
    let magnitude = delta.abs();
    let seconds =
        magnitude.num_seconds() as f64 + f64::from(magnitude.subsec_nanos()) / 1_000_000_000.0;

    let Some((count, unit)) = UNITS.iter().find_map(|(unit_secs, name)| {
        let count = (seconds / unit_secs) as u64;
        (count >= 1).then_some((count, *name))
    }) else {
        return "Now".to_string();
    };

    let plural = if count > 1 { "s" } else { "" };
    if delta < TimeDelta::zero() {
        format!("{count} {unit}{plural} ago")
    } else {
        format!("In {count} {unit}{plural}")
    }
}

/// Label for a last-sync instant as seen at `now`.
///
/// Instants before the year 2000 (including the epoch sentinel) read as
/// `"Never"`.
pub fn last_sync_label(last_sync: DateTime<Utc>, now: DateTime<Utc>) -> String {
    if last_sync.year() < 2000 {
        return "Never".to_string();
    }
    relative_time(last_sync - now)
}
