//! DateTime parsing helpers for bi-temporal timestamps.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Parse a datetime string in various common formats into a UTC [`DateTime`].
///
/// Extraction output and caller-supplied reference times arrive in whatever
/// shape the upstream model or client produced, so parsing is lenient.
/// Supported formats (attempted in order):
/// 1. RFC 3339 / ISO 8601 with timezone: `"2024-01-15T10:30:00Z"`, `"2024-01-15T10:30:00+05:00"`
/// 2. ISO 8601 with sub-seconds but no timezone: `"2024-01-15T10:30:00.123"`
/// 3. ISO 8601 without timezone (assumed UTC): `"2024-01-15T10:30:00"`
/// 4. Date only (midnight UTC): `"2024-01-15"`
/// 5. Year only (Jan 1 midnight UTC): `"2024"`; extraction models often
///    return bare years for facts like "joined in 2020"
///
/// Returns `None` for empty input or unrecognised formats.
pub fn parse_flexible_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    // 1. RFC 3339 (covers nanosecond precision with Z suffix too).
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    // 2. ISO 8601 with sub-seconds but no timezone.
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&ndt));
    }

    // 3. ISO 8601 without sub-seconds, no timezone.
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(Utc.from_utc_datetime(&ndt));
    }

    // 4. Date only (midnight UTC).
    if let Ok(nd) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return nd
            .and_hms_opt(0, 0, 0)
            .map(|ndt| Utc.from_utc_datetime(&ndt));
    }

    // 5. Bare year.
    if s.len() == 4 {
        if let Ok(year) = s.parse::<i32>() {
            return NaiveDate::from_ymd_opt(year, 1, 1)
                .and_then(|nd| nd.and_hms_opt(0, 0, 0))
                .map(|ndt| Utc.from_utc_datetime(&ndt));
        }
    }

    None
}
