//! Lenient parsing of the timestamp and duration formats the remote timer uses
//!
//! Nothing here fails loudly: unparseable input is `None` and the caller falls
//! back to its next source of truth.

use chrono::{DateTime, NaiveDateTime};
use serde_json::Value;

/// Parse an ISO-8601 timestamp into Unix milliseconds.
///
/// Accepts RFC 3339 with an offset (`2024-05-01T12:00:00.250+00:00`, `...Z`).
/// Timestamps without an offset are read as UTC.
pub fn parse_timestamp_ms(text: &str) -> Option<i64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.timestamp_millis());
    }

    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .map(|naive| naive.and_utc().timestamp_millis())
}

/// Parse a duration given either as a JSON number of seconds or as text.
///
/// Text may be a plain number (`"90"`) or clock notation (`H:MM:SS`,
/// `HH:MM:SS`, `MM:SS`). Sign and range are left to the caller to clamp.
pub fn parse_duration_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => parse_duration_text(s),
        _ => None,
    }
}

/// Text form of [`parse_duration_value`].
pub fn parse_duration_text(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if !text.contains(':') {
        return text.parse::<f64>().ok().filter(|v| v.is_finite());
    }

    let parts: Vec<&str> = text.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [h, m, s] => (*h, *m, *s),
        [m, s] => ("0", *m, *s),
        _ => return None,
    };

    let hours: u64 = hours.trim().parse().ok()?;
    let minutes: u64 = minutes.trim().parse().ok()?;
    let seconds: f64 = seconds.trim().parse().ok()?;
    if minutes >= 60 || !(0.0..60.0).contains(&seconds) {
        return None;
    }

    let whole = hours.checked_mul(3600)?.checked_add(minutes * 60)?;
    Some(whole as f64 + seconds)
}

/// Format whole seconds for logs and the status endpoint (`1:02:03`, `4:05`).
pub fn format_hms(total_seconds: u64) -> String {
    let h = total_seconds / 3600;
    let m = (total_seconds % 3600) / 60;
    let s = total_seconds % 60;
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}
