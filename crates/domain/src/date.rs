use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing::warn;

/// Parses a client supplied timestamp into UTC.
///
/// RFC 3339 timestamps keep their offset and are converted. Timestamps
/// without zone information are interpreted as UTC, which is logged as a
/// warning rather than rejected.
pub fn parse_timestamp_utc(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    for fmt in &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            warn!("Timestamp {} has no zone information, assuming UTC", raw);
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    // Date-only input has no time component to parse as NaiveDateTime
    if let Ok(date) = chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        warn!("Timestamp {} has no zone information, assuming UTC", raw);
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }
    None
}
