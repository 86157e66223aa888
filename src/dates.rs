use chrono::{DateTime, FixedOffset};

/// A validated `[time_since, time_until]` pair.
///
/// The original strings are kept as written so they can be forwarded to the
/// remote API without reformatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRange {
    since: String,
    until: String,
}

impl TimeRange {
    pub fn parse(since: &str, until: &str) -> Result<Self, String> {
        let start = parse_timestamp(since)?;
        let end = parse_timestamp(until)?;
        if start > end {
            return Err("time_since cannot be after time_until.".to_string());
        }
        Ok(Self {
            since: since.to_string(),
            until: until.to_string(),
        })
    }

    pub fn since(&self) -> &str {
        &self.since
    }

    pub fn until(&self) -> &str {
        &self.until
    }
}

pub fn parse_timestamp(value: &str) -> Result<DateTime<FixedOffset>, String> {
    DateTime::parse_from_rfc3339(value).map_err(|_| {
        format!("Invalid timestamp {value:?}. Use RFC 3339, e.g. 2026-02-03T00:00:00Z.")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parse_timestamp_valid() {
        let value = parse_timestamp("2026-02-03T08:30:00Z").unwrap();
        assert_eq!(value.year(), 2026);
        assert_eq!(value.month(), 2);
        assert_eq!(value.day(), 3);
        assert_eq!(value.hour(), 8);
    }

    #[test]
    fn parse_timestamp_invalid() {
        assert!(parse_timestamp("2026-02-03").is_err());
        assert!(parse_timestamp("03.02.2026 08:00").is_err());
    }

    #[test]
    fn range_keeps_strings_verbatim() {
        let range = TimeRange::parse("2026-02-01T00:00:00+01:00", "2026-02-28T23:59:59Z").unwrap();
        assert_eq!(range.since(), "2026-02-01T00:00:00+01:00");
        assert_eq!(range.until(), "2026-02-28T23:59:59Z");
    }

    #[test]
    fn range_rejects_reversed_bounds() {
        let err = TimeRange::parse("2026-03-01T00:00:00Z", "2026-02-01T00:00:00Z").unwrap_err();
        assert!(err.contains("after"));
    }
}
