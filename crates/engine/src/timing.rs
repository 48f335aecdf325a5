//! RFC3339 timestamp arithmetic for `durationMs` fields.

use chrono::DateTime;

/// Milliseconds between two RFC3339 timestamps produced by
/// [`wre_core::now_iso`]. Returns `0` if either fails to parse or `end` is
/// before `start`.
#[must_use]
pub fn duration_ms_between(start: &str, end: &str) -> u64 {
    let (Ok(start), Ok(end)) = (
        DateTime::parse_from_rfc3339(start),
        DateTime::parse_from_rfc3339(end),
    ) else {
        return 0;
    };
    (end - start).num_milliseconds().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computes_positive_duration() {
        let ms = duration_ms_between(
            "2026-01-01T00:00:00.000Z",
            "2026-01-01T00:00:01.500Z",
        );
        assert_eq!(ms, 1500);
    }

    #[test]
    fn unparseable_input_yields_zero() {
        assert_eq!(duration_ms_between("not-a-date", "also-not"), 0);
    }
}
