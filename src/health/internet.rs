//! C6b: internet connectivity health. Concurrently probes a set of ping
//! targets and DNS targets, aggregates latency/loss, and derives a status
//! per the same normal/degraded/down tri-state the bridge monitor uses.

use std::net::ToSocketAddrs;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::InternetConfig;
use crate::health::bounded_history::BoundedHistory;
use crate::subprocess;

#[derive(Debug, Clone, Serialize)]
pub struct InternetHealthSample {
    pub timestamp: DateTime<Utc>,
    pub latency_ms: Option<f64>,
    pub dns_resolve_ms: Option<f64>,
    pub packet_loss_pct: f64,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InternetStatistics {
    pub mean_latency_ms: Option<f64>,
    pub min_latency_ms: Option<f64>,
    pub max_latency_ms: Option<f64>,
    pub p95_latency_ms: Option<f64>,
    pub mean_dns_resolve_ms: Option<f64>,
    pub mean_packet_loss_pct: Option<f64>,
    pub uptime_percentage: Option<f64>,
    pub history_span_hours: Option<f64>,
    pub total_checks: usize,
}

pub struct InternetHealthMonitor {
    ping_targets: Vec<String>,
    dns_targets: Vec<String>,
    probe_timeout: Duration,
    history: Mutex<BoundedHistory<InternetHealthSample>>,
}

impl InternetHealthMonitor {
    pub fn new(config: &InternetConfig) -> Self {
        Self {
            ping_targets: config.ping_targets.clone(),
            dns_targets: config.dns_targets.clone(),
            probe_timeout: Duration::from_secs(config.probe_timeout_secs),
            history: Mutex::new(BoundedHistory::new(config.max_history)),
        }
    }

    pub async fn check_health(&self) -> InternetHealthSample {
        let timeout = self.probe_timeout;
        let ping_handles: Vec<_> = self
            .ping_targets
            .iter()
            .cloned()
            .map(|t| tokio::spawn(async move { ping_once(&t, timeout).await }))
            .collect();
        let dns_handles: Vec<_> = self
            .dns_targets
            .iter()
            .cloned()
            .map(|t| tokio::spawn(async move { resolve_once(&t, timeout).await }))
            .collect();

        let mut ping_results = Vec::with_capacity(ping_handles.len());
        for h in ping_handles {
            ping_results.push(h.await.unwrap_or(None));
        }
        let mut dns_results = Vec::with_capacity(dns_handles.len());
        for h in dns_handles {
            dns_results.push(h.await.unwrap_or(None));
        }

        let latency_ms = ping_results.iter().flatten().cloned().fold(None, min_opt);
        let dns_resolve_ms = dns_results.iter().flatten().cloned().fold(None, min_opt);

        let total_probes = ping_results.len() + dns_results.len();
        let failed_probes = ping_results.iter().filter(|r| r.is_none()).count()
            + dns_results.iter().filter(|r| r.is_none()).count();
        let packet_loss_pct = if total_probes == 0 {
            0.0
        } else {
            (failed_probes as f64 / total_probes as f64) * 100.0
        };

        let ping_all_failed = !ping_results.is_empty() && ping_results.iter().all(|r| r.is_none());
        let dns_all_failed = !dns_results.is_empty() && dns_results.iter().all(|r| r.is_none());
        let exactly_one_fail = ping_all_failed ^ dns_all_failed;

        let status = if (ping_all_failed && dns_all_failed) || packet_loss_pct >= 50.0 {
            "down"
        } else if latency_ms.map(|l| l >= 100.0).unwrap_or(false)
            || dns_resolve_ms.map(|d| d >= 500.0).unwrap_or(false)
            || packet_loss_pct >= 5.0
            || exactly_one_fail
        {
            "degraded"
        } else {
            "healthy"
        };

        let sample = InternetHealthSample {
            timestamp: Utc::now(),
            latency_ms,
            dns_resolve_ms,
            packet_loss_pct,
            status: status.to_string(),
        };
        self.history.lock().unwrap().push(sample.clone());
        sample
    }

    pub fn history(&self, limit: usize) -> Vec<InternetHealthSample> {
        self.history.lock().unwrap().snapshot(limit)
    }

    pub fn statistics(&self) -> InternetStatistics {
        let history = self.history.lock().unwrap();
        let total = history.len();
        if total == 0 {
            return InternetStatistics {
                mean_latency_ms: None,
                min_latency_ms: None,
                max_latency_ms: None,
                p95_latency_ms: None,
                mean_dns_resolve_ms: None,
                mean_packet_loss_pct: None,
                uptime_percentage: None,
                history_span_hours: None,
                total_checks: 0,
            };
        }

        let mut latencies: Vec<f64> = history.iter().filter_map(|s| s.latency_ms).collect();
        latencies.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let mean_latency_ms = mean(&latencies);
        let min_latency_ms = latencies.first().copied();
        let max_latency_ms = latencies.last().copied();
        let p95_latency_ms = percentile(&latencies, 0.95);

        let dns: Vec<f64> = history.iter().filter_map(|s| s.dns_resolve_ms).collect();
        let mean_dns_resolve_ms = mean(&dns);

        let losses: Vec<f64> = history.iter().map(|s| s.packet_loss_pct).collect();
        let mean_packet_loss_pct = mean(&losses);

        let up_count = history.iter().filter(|s| s.status != "down").count();
        let uptime_percentage = Some((up_count as f64 / total as f64) * 100.0);

        let timestamps: Vec<DateTime<Utc>> = history.iter().map(|s| s.timestamp).collect();
        let history_span_hours = match (timestamps.first(), timestamps.last()) {
            (Some(first), Some(last)) => {
                Some((*last - *first).num_seconds() as f64 / 3600.0)
            }
            _ => None,
        };

        InternetStatistics {
            mean_latency_ms,
            min_latency_ms,
            max_latency_ms,
            p95_latency_ms,
            mean_dns_resolve_ms,
            mean_packet_loss_pct,
            uptime_percentage,
            history_span_hours,
            total_checks: total,
        }
    }
}

fn min_opt(acc: Option<f64>, v: f64) -> Option<f64> {
    Some(match acc {
        Some(a) => a.min(v),
        None => v,
    })
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let idx = ((sorted.len() as f64 - 1.0) * p).round() as usize;
    sorted.get(idx).copied()
}

/// Runs `ping -c 1 -W <timeout> <target>`, returning round-trip ms on success.
async fn ping_once(target: &str, timeout: Duration) -> Option<f64> {
    let started = Instant::now();
    let timeout_secs = timeout.as_secs().max(1).to_string();
    let out = subprocess::run(&["ping", "-c", "1", "-W", &timeout_secs, target], timeout).await;
    if out.code != 0 {
        return None;
    }
    parse_ping_latency(&out.stdout).or_else(|| Some(started.elapsed().as_secs_f64() * 1000.0))
}

fn parse_ping_latency(output: &str) -> Option<f64> {
    output
        .lines()
        .find_map(|line| line.split("time=").nth(1))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|s| s.parse::<f64>().ok())
}

/// Resolves a hostname via the system resolver, timing it, bounded by `timeout`.
async fn resolve_once(target: &str, timeout: Duration) -> Option<f64> {
    let target = target.to_string();
    let started = Instant::now();
    let handle = tokio::task::spawn_blocking(move || {
        format!("{target}:0").to_socket_addrs().map(|mut i| i.next())
    });
    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(Ok(Some(_)))) => Some(started.elapsed().as_secs_f64() * 1000.0),
        _ => None,
    }
}

/// Spawn the internet monitor's periodic probing cycle as a background task.
pub fn spawn_internet_cycle(monitor: Arc<InternetHealthMonitor>, interval_secs: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            monitor.check_health().await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_rule_matches_scenario_thresholds() {
        // both fail -> down
        assert_eq!(status_of(None, None, 100.0), "down");
        // loss >= 50 -> down
        assert_eq!(status_of(Some(10.0), Some(10.0), 60.0), "down");
        // high latency -> degraded
        assert_eq!(status_of(Some(150.0), Some(10.0), 0.0), "degraded");
        // all healthy
        assert_eq!(status_of(Some(10.0), Some(10.0), 0.0), "healthy");
    }

    fn status_of(latency_ms: Option<f64>, dns_resolve_ms: Option<f64>, packet_loss_pct: f64) -> &'static str {
        if packet_loss_pct >= 50.0 || (latency_ms.is_none() && dns_resolve_ms.is_none()) {
            "down"
        } else if latency_ms.map(|l| l >= 100.0).unwrap_or(false)
            || dns_resolve_ms.map(|d| d >= 500.0).unwrap_or(false)
            || packet_loss_pct >= 5.0
        {
            "degraded"
        } else {
            "healthy"
        }
    }

    #[test]
    fn percentile_handles_empty_and_single() {
        assert_eq!(percentile(&[], 0.95), None);
        assert_eq!(percentile(&[5.0], 0.95), Some(5.0));
    }

    #[tokio::test]
    async fn check_health_never_panics_for_unreachable_targets() {
        let monitor = InternetHealthMonitor::new(&InternetConfig {
            ping_targets: vec!["192.0.2.1".to_string()],
            dns_targets: vec!["invalid.invalid".to_string()],
            probe_timeout_secs: 1,
            max_history: 10,
            sample_interval_secs: 30,
        });
        let sample = monitor.check_health().await;
        assert!(sample.packet_loss_pct >= 0.0);
    }
}
