//! Shared request/response data shapes used across the HTTP surface: the
//! `from`/`to` time-range convention, and the persisted document schemas for
//! investigations and report schedules (§3).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Half-open `[from, to]` interval of RFC-3339 UTC instants. Unparseable or
/// absent bounds fall back to `(now-24h, now)`, per §6.
#[derive(Debug, Clone)]
pub struct TimeRange {
    pub from: String,
    pub to: String,
}

impl TimeRange {
    pub fn parse(from: Option<&str>, to: Option<&str>) -> Self {
        let now = Utc::now();
        let default_from = now - Duration::hours(24);

        let parsed_from = from.and_then(|s| DateTime::parse_from_rfc3339(s).ok());
        let parsed_to = to.and_then(|s| DateTime::parse_from_rfc3339(s).ok());

        Self {
            from: parsed_from
                .map(|d| d.to_rfc3339())
                .unwrap_or_else(|| default_from.to_rfc3339()),
            to: parsed_to.map(|d| d.to_rfc3339()).unwrap_or_else(|| now.to_rfc3339()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvestigationStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestigationNote {
    pub id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Investigation {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: InvestigationStatus,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub alert_ids: Vec<String>,
    #[serde(default)]
    pub device_ips: Vec<String>,
    #[serde(default)]
    pub notes: Vec<InvestigationNote>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Investigation {
    pub fn new(title: String, description: String, severity: Severity) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title,
            description,
            status: InvestigationStatus::Open,
            severity,
            created_at: now,
            updated_at: now,
            alert_ids: Vec::new(),
            device_ips: Vec::new(),
            notes: Vec::new(),
            tags: Vec::new(),
        }
    }

    /// Link lists are deduplicated on every mutation, per §3.
    pub fn dedupe_links(&mut self) {
        dedupe(&mut self.alert_ids);
        dedupe(&mut self.device_ips);
    }
}

fn dedupe(v: &mut Vec<String>) {
    let mut seen = std::collections::HashSet::new();
    v.retain(|item| seen.insert(item.clone()));
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFrequency {
    Daily,
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Json,
    Csv,
    Html,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportSection {
    TrafficSummary,
    Alerts,
    Devices,
    Compliance,
    Risk,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSchedule {
    pub id: String,
    pub name: String,
    pub frequency: ReportFrequency,
    pub format: ReportFormat,
    pub sections: Vec<ReportSection>,
    #[serde(default)]
    pub recipients: Vec<String>,
    pub enabled: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ReportSchedule {
    /// Invariant: `sections` non-empty; `next_run >= created_at` when enabled.
    pub fn new(
        name: String,
        frequency: ReportFrequency,
        format: ReportFormat,
        sections: Vec<ReportSection>,
        recipients: Vec<String>,
        enabled: bool,
    ) -> Result<Self, String> {
        if sections.is_empty() {
            return Err("sections must be non-empty".to_string());
        }
        let now = Utc::now();
        let next_run = enabled.then(|| now + next_run_offset(frequency));
        Ok(Self {
            id: Uuid::new_v4().to_string(),
            name,
            frequency,
            format,
            sections,
            recipients,
            enabled,
            last_run: None,
            next_run,
            created_at: now,
        })
    }
}

fn next_run_offset(frequency: ReportFrequency) -> Duration {
    match frequency {
        ReportFrequency::Daily => Duration::days(1),
        ReportFrequency::Weekly => Duration::weeks(1),
        ReportFrequency::Monthly => Duration::days(30),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckInfo {
    pub acknowledged: bool,
    pub acknowledged_by: String,
    pub acknowledged_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineInfo {
    pub manufacturer: Option<String>,
    pub hostname: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_range_falls_back_to_last_24h_on_unparseable_bounds() {
        let range = TimeRange::parse(Some("not-a-date"), None);
        let from = DateTime::parse_from_rfc3339(&range.from).unwrap();
        let to = DateTime::parse_from_rfc3339(&range.to).unwrap();
        assert!((to - from) - Duration::hours(24) < Duration::seconds(1));
    }

    #[test]
    fn investigation_dedupes_link_lists() {
        let mut inv = Investigation::new("t".into(), "d".into(), Severity::Low);
        inv.alert_ids = vec!["a".into(), "b".into(), "a".into()];
        inv.dedupe_links();
        assert_eq!(inv.alert_ids, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn report_schedule_rejects_empty_sections() {
        let result = ReportSchedule::new(
            "n".into(),
            ReportFrequency::Daily,
            ReportFormat::Json,
            Vec::new(),
            Vec::new(),
            true,
        );
        assert!(result.is_err());
    }

    #[test]
    fn report_schedule_next_run_after_created_at_when_enabled() {
        let schedule = ReportSchedule::new(
            "n".into(),
            ReportFrequency::Weekly,
            ReportFormat::Json,
            vec![ReportSection::Alerts],
            Vec::new(),
            true,
        )
        .unwrap();
        assert!(schedule.next_run.unwrap() >= schedule.created_at);
    }
}
