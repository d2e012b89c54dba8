//! Time-parameter parsing for the timeline query API.
//!
//! Accepts either an ISO 8601 timestamp (`YYYY-MM-DDTHH:MM:SS[.sss][Z]`) or a
//! bare Unix epoch integer (seconds). Query strings commonly arrive with the
//! colons in an ISO timestamp percent-encoded (`%3A`), so callers should
//! decode the raw query value before handing it to [`parse_time_param`].

use chrono::{DateTime, Utc};
use std::borrow::Cow;

/// Default lookback window applied when a timeline query omits `start`.
pub const DEFAULT_WINDOW: std::time::Duration = std::time::Duration::from_secs(24 * 3600);

/// Decode `%3A`/`%3a` sequences left over from a query string that wasn't
/// fully percent-decoded by the web framework's query extractor.
pub fn decode_colon_escapes(raw: &str) -> Cow<'_, str> {
    if !raw.contains("%3A") && !raw.contains("%3a") {
        return Cow::Borrowed(raw);
    }
    Cow::Owned(raw.replace("%3A", ":").replace("%3a", ":"))
}

/// Parse a time-parameter value accepted by the timeline endpoints:
/// either a UNIX epoch integer (seconds) or an ISO 8601 / RFC 3339
/// timestamp, optionally with fractional seconds and a trailing `Z`.
pub fn parse_time_param(raw: &str) -> Result<DateTime<Utc>, String> {
    let decoded = decode_colon_escapes(raw.trim());

    if let Ok(epoch) = decoded.parse::<i64>() {
        return DateTime::from_timestamp(epoch, 0)
            .ok_or_else(|| format!("epoch out of range: {epoch}"));
    }

    DateTime::parse_from_rfc3339(&decoded)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid time parameter '{raw}': {e}"))
}

/// Resolve the `start`/`end` query parameters of a timeline query into a
/// `[start, end)` window, defaulting `end` to now and `start` to
/// `end - DEFAULT_WINDOW` when omitted.
///
/// An inverted window (`start > end`) is not an error: it's handed back
/// as-is and left for the overlap query to naturally resolve to an empty
/// segment list.
pub fn resolve_window(
    start: Option<&str>,
    end: Option<&str>,
) -> Result<(DateTime<Utc>, DateTime<Utc>), String> {
    let end_dt = match end {
        Some(raw) => parse_time_param(raw)?,
        None => Utc::now(),
    };
    let start_dt = match start {
        Some(raw) => parse_time_param(raw)?,
        None => end_dt - chrono::Duration::from_std(DEFAULT_WINDOW).unwrap(),
    };

    Ok((start_dt, end_dt))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_unix_epoch() {
        let dt = parse_time_param("1700000000").unwrap();
        assert_eq!(dt.timestamp(), 1700000000);
    }

    #[test]
    fn parses_iso8601_with_z() {
        let dt = parse_time_param("2024-01-01T12:00:00Z").unwrap();
        assert_eq!(dt.timestamp(), 1704110400);
    }

    #[test]
    fn parses_iso8601_with_millis() {
        let dt = parse_time_param("2024-01-01T12:00:00.500Z").unwrap();
        assert_eq!(dt.timestamp(), 1704110400);
    }

    #[test]
    fn decodes_percent_encoded_colons() {
        let dt = parse_time_param("2024-01-01T12%3A00%3A00Z").unwrap();
        assert_eq!(dt.timestamp(), 1704110400);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_time_param("not-a-time").is_err());
    }

    #[test]
    fn default_window_is_applied() {
        let (start, end) = resolve_window(None, None).unwrap();
        assert_eq!((end - start).num_seconds(), 24 * 3600);
    }

    #[test]
    fn inverted_window_is_accepted_not_rejected() {
        let (start, end) = resolve_window(
            Some("2024-01-02T00:00:00Z"),
            Some("2024-01-01T00:00:00Z"),
        )
        .unwrap();
        assert!(start > end);
    }
}
