//! Human-readable capture times for history listings.

use chrono::{DateTime, Utc};

/// Describe `timestamp` relative to `now`.
///
/// Recent captures read as "just now" / "5 minutes ago" / "3 hours ago" /
/// "2 days ago"; anything a week or older gets an absolute date.
pub fn relative_time(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(timestamp);
    let minutes = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();

    if minutes < 1 {
        "just now".to_string()
    } else if minutes < 60 {
        ago(minutes, "minute")
    } else if hours < 24 {
        ago(hours, "hour")
    } else if days < 7 {
        ago(days, "day")
    } else {
        timestamp.format("%b %-d, %Y, %H:%M").to_string()
    }
}

fn ago(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", n, unit)
    }
}
