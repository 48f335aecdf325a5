//! Timestamp formatting shared across the event log, run registry, and HTTP
//! payloads.

use chrono::{SecondsFormat, Utc};

/// Current UTC time as an RFC 3339 string with millisecond precision.
///
/// Mirrors the original runtime's `_now_iso`, which every persisted record
/// uses as its `generatedAt` / `createdAt` / `updatedAt` stamp.
#[must_use]
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current UTC time as a Unix timestamp in seconds, used for session
/// cookie issuance/expiry rather than run/event timestamps.
#[must_use]
pub fn now_unix_seconds() -> i64 {
    Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_iso_is_rfc3339() {
        let stamp = now_iso();
        assert!(chrono::DateTime::parse_from_rfc3339(&stamp).is_ok());
        assert!(stamp.ends_with('Z'));
    }

    #[test]
    fn now_unix_seconds_is_plausible() {
        let ts = now_unix_seconds();
        assert!(ts > 1_700_000_000);
    }
}
