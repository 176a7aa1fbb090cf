//! C2: pure functions deriving retention tier and embedded date from an
//! OpenSearch index name. Never suspends, never fails for recoverable input.

use chrono::{NaiveDate, TimeZone, Utc};
use regex::Regex;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Hot,
    Warm,
    Cold,
    Unknown,
}

const TIER_PREFIXES: &[(&str, Tier)] = &[
    ("arkime", Tier::Cold),
    ("sessions", Tier::Cold),
    ("suricata", Tier::Warm),
    ("zeek", Tier::Hot),
];

/// Case-insensitive prefix match against the fixed tier table.
pub fn tier(name: &str) -> Tier {
    let lower = name.to_lowercase();
    for (prefix, tier) in TIER_PREFIXES {
        if lower.starts_with(prefix) {
            return *tier;
        }
    }
    Tier::Unknown
}

static DATE_DOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})\.(\d{2})\.(\d{2})$").unwrap());
static DATE_DASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})$").unwrap());
static DATE_COMPACT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{6})$").unwrap());

/// Tries the three patterns in order (dot, dash, compact `YYMMDD`); returns
/// the first that parses to a valid calendar date at UTC midnight.
pub fn index_date(name: &str) -> Option<chrono::DateTime<Utc>> {
    if let Some(caps) = DATE_DOT.captures(name) {
        if let Some(d) = ymd(&caps[1], &caps[2], &caps[3]) {
            return Some(d);
        }
    }
    if let Some(caps) = DATE_DASH.captures(name) {
        if let Some(d) = ymd(&caps[1], &caps[2], &caps[3]) {
            return Some(d);
        }
    }
    if let Some(caps) = DATE_COMPACT.captures(name) {
        let digits = &caps[1];
        let (yy, mm, dd) = (&digits[0..2], &digits[2..4], &digits[4..6]);
        let year = format!("20{yy}");
        if let Some(d) = ymd(&year, mm, dd) {
            return Some(d);
        }
    }
    None
}

fn ymd(y: &str, m: &str, d: &str) -> Option<chrono::DateTime<Utc>> {
    let year: i32 = y.parse().ok()?;
    let month: u32 = m.parse().ok()?;
    let day: u32 = d.parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
}

/// System indices (leading `.`) must be rejected upstream by the caller; this
/// helper centralizes that predicate so callers don't hand-roll it.
pub fn is_system_index(name: &str) -> bool {
    name.starts_with('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_matches_prefix_case_insensitively() {
        assert_eq!(tier("zeek-conn-2026.02.25"), Tier::Hot);
        assert_eq!(tier("SURICATA-alert-2025-12-01"), Tier::Warm);
        assert_eq!(tier("arkime-sessions3-260101"), Tier::Cold);
        assert_eq!(tier("sessions2-260101"), Tier::Cold);
        assert_eq!(tier("whatever-2026"), Tier::Unknown);
    }

    #[test]
    fn index_date_parses_all_three_patterns() {
        let dot = index_date("zeek-conn-2026.02.25").unwrap();
        assert_eq!(dot.format("%Y-%m-%d").to_string(), "2026-02-25");

        let dash = index_date("suricata-alert-2025-12-01").unwrap();
        assert_eq!(dash.format("%Y-%m-%d").to_string(), "2025-12-01");

        let compact = index_date("arkime-sessions3-260101").unwrap();
        assert_eq!(compact.format("%Y-%m-%d").to_string(), "2026-01-01");
    }

    #[test]
    fn index_date_absent_when_no_pattern_matches() {
        assert!(index_date("zeek-conn-notadate").is_none());
    }

    #[test]
    fn system_indices_are_flagged() {
        assert!(is_system_index(".kibana"));
        assert!(!is_system_index("zeek-conn-2026.02.25"));
    }
}
