//! Timestamp parsing for upstream dates and formatting for the wire.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};

/// Layouts tried after RFC 3339 and RFC 2822, for feeds that emit
/// almost-ISO dates.
const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parses a feed date in any of the common representations.
///
/// Accepts RFC 3339 / ISO 8601 (`dc:date`, Atom), RFC 2822 (`pubDate`,
/// including obsolete zone names such as `GMT` or `EST`), offset-less ISO
/// timestamps (read as UTC) and bare dates (midnight UTC).
///
/// Returns `None` for empty or unrecognized input.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// RFC 822 style GMT date used by `pubDate` and `lastBuildDate`,
/// e.g. `Mon, 02 Jan 2006 15:04:05 GMT`.
pub fn to_wire_date(dt: &DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Full ISO 8601 with millisecond precision and a `Z` suffix, used by `dc:date`.
pub fn to_iso_date(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}
