//! C6a: Linux bridge health monitor. Reads bridge/NIC state from sysfs,
//! tracks counter deltas and uptime, and derives a health status. Every
//! sysfs read is best-effort — missing files degrade to "unknown"/false/0
//! rather than failing the cycle.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::BridgeConfig;
use crate::health::bounded_history::BoundedHistory;
use crate::subprocess;

const SYSFS_NET: &str = "/sys/class/net";
const BYPASS_STATE_FILE: &str = "/var/run/nettap-bypass-active";

#[derive(Debug, Clone, Serialize)]
pub struct BridgeHealthSample {
    pub bridge_state: String,
    pub wan_link: bool,
    pub lan_link: bool,
    pub bypass_active: bool,
    pub watchdog_active: bool,
    pub latency_us: f64,
    pub rx_bytes_delta: u64,
    pub tx_bytes_delta: u64,
    pub rx_packets_delta: u64,
    pub tx_packets_delta: u64,
    pub uptime_seconds: f64,
    pub health_status: String,
    pub issues: Vec<String>,
    pub last_check: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BridgeStatistics {
    pub average_latency_us: Option<f64>,
    pub total_rx_bytes: u64,
    pub total_tx_bytes: u64,
    pub total_rx_packets: u64,
    pub total_tx_packets: u64,
    pub uptime_percentage: Option<f64>,
    pub longest_downtime_seconds: u64,
    pub total_checks: usize,
    pub status_counts: std::collections::HashMap<String, usize>,
}

#[derive(Default)]
struct Counters {
    rx_bytes: u64,
    tx_bytes: u64,
    rx_packets: u64,
    tx_packets: u64,
}

struct MutableState {
    prev_counters: Option<Counters>,
    bridge_up_since: Option<Instant>,
    last_bridge_state: Option<String>,
    bypass_active: bool,
}

pub struct BridgeHealthMonitor {
    bridge_name: String,
    wan_iface: String,
    lan_iface: String,
    history: Mutex<BoundedHistory<BridgeHealthSample>>,
    state: Mutex<MutableState>,
}

impl BridgeHealthMonitor {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            bridge_name: config.bridge_name.clone(),
            wan_iface: config.wan_iface.clone(),
            lan_iface: config.lan_iface.clone(),
            history: Mutex::new(BoundedHistory::new(config.max_history)),
            state: Mutex::new(MutableState {
                prev_counters: None,
                bridge_up_since: None,
                last_bridge_state: None,
                bypass_active: false,
            }),
        }
    }

    pub async fn check_health(&self) -> BridgeHealthSample {
        let now = Utc::now();
        let mut issues = Vec::new();

        let bridge_state = check_bridge_state(&self.bridge_name).await;
        let wan_link = check_carrier(&self.wan_iface).await;
        let lan_link = check_carrier(&self.lan_iface).await;
        let stats = read_interface_stats(&self.bridge_name).await;

        let (rx_bytes_delta, tx_bytes_delta, rx_packets_delta, tx_packets_delta, bypass_active, uptime_seconds) = {
            let mut state = self.state.lock().unwrap();

            let deltas = match &state.prev_counters {
                Some(prev) => (
                    stats.rx_bytes.saturating_sub(prev.rx_bytes),
                    stats.tx_bytes.saturating_sub(prev.tx_bytes),
                    stats.rx_packets.saturating_sub(prev.rx_packets),
                    stats.tx_packets.saturating_sub(prev.tx_packets),
                ),
                None => (0, 0, 0, 0),
            };
            state.prev_counters = Some(Counters {
                rx_bytes: stats.rx_bytes,
                tx_bytes: stats.tx_bytes,
                rx_packets: stats.rx_packets,
                tx_packets: stats.tx_packets,
            });

            if state.last_bridge_state.as_deref() != Some(bridge_state.as_str()) {
                state.bridge_up_since = if bridge_state == "up" {
                    Some(Instant::now())
                } else {
                    None
                };
                state.last_bridge_state = Some(bridge_state.clone());
            }
            let uptime = state
                .bridge_up_since
                .map(|t| t.elapsed().as_secs_f64())
                .unwrap_or(0.0);

            let bypass = state.bypass_active || check_bypass_file();

            (deltas.0, deltas.1, deltas.2, deltas.3, bypass, uptime)
        };

        let watchdog_active = check_watchdog().await;
        let latency_us = estimate_latency(&bridge_state, wan_link, lan_link);

        if bridge_state == "down" {
            issues.push("Bridge interface is down".to_string());
        } else if bridge_state == "unknown" {
            issues.push("Bridge interface state could not be determined".to_string());
        }
        if !wan_link {
            issues.push(format!("WAN interface {} has no carrier", self.wan_iface));
        }
        if !lan_link {
            issues.push(format!("LAN interface {} has no carrier", self.lan_iface));
        }
        if bypass_active {
            issues.push("Bypass mode is active -- traffic is not being inspected".to_string());
        }
        if !watchdog_active {
            issues.push("Watchdog service is not running".to_string());
        }

        let health_status = determine_health_status(&bridge_state, wan_link, lan_link, bypass_active);

        let sample = BridgeHealthSample {
            bridge_state,
            wan_link,
            lan_link,
            bypass_active,
            watchdog_active,
            latency_us,
            rx_bytes_delta,
            tx_bytes_delta,
            rx_packets_delta,
            tx_packets_delta,
            uptime_seconds,
            health_status,
            issues,
            last_check: now,
        };

        self.history.lock().unwrap().push(sample.clone());
        sample
    }

    pub fn history(&self, limit: usize) -> Vec<BridgeHealthSample> {
        self.history.lock().unwrap().snapshot(limit)
    }

    pub fn statistics(&self) -> BridgeStatistics {
        let history = self.history.lock().unwrap();
        let total = history.len();
        if total == 0 {
            let mut status_counts = std::collections::HashMap::new();
            for s in ["normal", "degraded", "bypass", "down"] {
                status_counts.insert(s.to_string(), 0);
            }
            return BridgeStatistics {
                average_latency_us: None,
                total_rx_bytes: 0,
                total_tx_bytes: 0,
                total_rx_packets: 0,
                total_tx_packets: 0,
                uptime_percentage: None,
                longest_downtime_seconds: 0,
                total_checks: 0,
                status_counts,
            };
        }

        let latencies: Vec<f64> = history.iter().map(|h| h.latency_us).filter(|&l| l > 0.0).collect();
        let average_latency_us = if latencies.is_empty() {
            None
        } else {
            Some(latencies.iter().sum::<f64>() / latencies.len() as f64)
        };

        let total_rx_bytes = history.iter().map(|h| h.rx_bytes_delta).sum();
        let total_tx_bytes = history.iter().map(|h| h.tx_bytes_delta).sum();
        let total_rx_packets = history.iter().map(|h| h.rx_packets_delta).sum();
        let total_tx_packets = history.iter().map(|h| h.tx_packets_delta).sum();

        let mut status_counts = std::collections::HashMap::new();
        for s in ["normal", "degraded", "bypass", "down"] {
            status_counts.insert(s.to_string(), 0);
        }
        for h in history.iter() {
            if let Some(c) = status_counts.get_mut(&h.health_status) {
                *c += 1;
            }
        }

        let up_count = status_counts["normal"] + status_counts["degraded"];
        let uptime_percentage = Some((up_count as f64 / total as f64) * 100.0);

        let mut longest_down_streak = 0usize;
        let mut current_streak = 0usize;
        for h in history.iter() {
            if h.health_status == "down" {
                current_streak += 1;
                longest_down_streak = longest_down_streak.max(current_streak);
            } else {
                current_streak = 0;
            }
        }
        let longest_downtime_seconds = (longest_down_streak * 30) as u64;

        BridgeStatistics {
            average_latency_us,
            total_rx_bytes,
            total_tx_bytes,
            total_rx_packets,
            total_tx_packets,
            uptime_percentage,
            longest_downtime_seconds,
            total_checks: total,
            status_counts,
        }
    }

    pub fn trigger_bypass(&self) -> DateTime<Utc> {
        let mut state = self.state.lock().unwrap();
        state.bypass_active = true;
        drop(state);
        let ts = Utc::now();
        write_bypass_file(true, ts);
        tracing::warn!("bridge bypass mode ACTIVATED at {ts}");
        ts
    }

    pub fn disable_bypass(&self) -> DateTime<Utc> {
        let mut state = self.state.lock().unwrap();
        state.bypass_active = false;
        drop(state);
        let ts = Utc::now();
        write_bypass_file(false, ts);
        tracing::info!("bridge bypass mode DEACTIVATED at {ts}");
        ts
    }
}

async fn check_bridge_state(bridge_name: &str) -> String {
    let path = Path::new(SYSFS_NET).join(bridge_name).join("operstate");
    match read_sysfs_file(&path).await {
        Some(content) => match content.trim().to_lowercase().as_str() {
            "up" => "up".to_string(),
            "down" | "lowerlayerdown" => "down".to_string(),
            _ => "unknown".to_string(),
        },
        None => "unknown".to_string(),
    }
}

async fn check_carrier(iface: &str) -> bool {
    let path = Path::new(SYSFS_NET).join(iface).join("carrier");
    matches!(read_sysfs_file(&path).await, Some(c) if c.trim() == "1")
}

async fn read_interface_stats(iface: &str) -> Counters {
    let stats_dir = Path::new(SYSFS_NET).join(iface).join("statistics");
    let mut counters = Counters::default();
    if let Some(c) = read_sysfs_file(&stats_dir.join("rx_bytes")).await {
        counters.rx_bytes = c.trim().parse().unwrap_or(0);
    }
    if let Some(c) = read_sysfs_file(&stats_dir.join("tx_bytes")).await {
        counters.tx_bytes = c.trim().parse().unwrap_or(0);
    }
    if let Some(c) = read_sysfs_file(&stats_dir.join("rx_packets")).await {
        counters.rx_packets = c.trim().parse().unwrap_or(0);
    }
    if let Some(c) = read_sysfs_file(&stats_dir.join("tx_packets")).await {
        counters.tx_packets = c.trim().parse().unwrap_or(0);
    }
    counters
}

async fn read_sysfs_file(path: &Path) -> Option<String> {
    tokio::fs::read_to_string(path).await.ok()
}

fn determine_health_status(bridge_state: &str, wan_link: bool, lan_link: bool, bypass_active: bool) -> String {
    if bypass_active {
        return "bypass".to_string();
    }
    if bridge_state == "down" || (!wan_link && !lan_link) {
        return "down".to_string();
    }
    if bridge_state == "unknown" || !wan_link || !lan_link {
        return "degraded".to_string();
    }
    "normal".to_string()
}

fn estimate_latency(bridge_state: &str, wan_link: bool, lan_link: bool) -> f64 {
    if bridge_state != "up" {
        return 0.0;
    }
    let base = 50.0;
    if !wan_link || !lan_link {
        return base * 3.0;
    }
    base
}

fn check_bypass_file() -> bool {
    Path::new(BYPASS_STATE_FILE).exists()
}

fn write_bypass_file(active: bool, ts: DateTime<Utc>) {
    if active {
        if let Some(parent) = Path::new(BYPASS_STATE_FILE).parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::debug!("could not create bypass file directory: {e}");
                return;
            }
        }
        if let Err(e) = std::fs::write(BYPASS_STATE_FILE, ts.to_rfc3339()) {
            tracing::debug!("could not write bypass state file: {e}");
        }
    } else if Path::new(BYPASS_STATE_FILE).exists() {
        if let Err(e) = std::fs::remove_file(BYPASS_STATE_FILE) {
            tracing::debug!("could not remove bypass state file: {e}");
        }
    }
}

async fn check_watchdog() -> bool {
    let out = subprocess::run(
        &["systemctl", "is-active", "nettap-watchdog"],
        Duration::from_secs(5),
    )
    .await;
    out.stdout.trim() == "active"
}

/// Spawn the bridge monitor's periodic sampling cycle as a background task.
pub fn spawn_bridge_cycle(monitor: Arc<BridgeHealthMonitor>, interval_secs: u64) {
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
    fn scenario_s3_bridge_down_derivation() {
        assert_eq!(determine_health_status("down", false, false, false), "down");
        assert_eq!(determine_health_status("up", true, false, false), "degraded");
        assert_eq!(determine_health_status("up", true, true, true), "bypass");
        assert_eq!(determine_health_status("up", true, true, false), "normal");
        assert_eq!(determine_health_status("unknown", true, true, false), "degraded");
    }

    #[test]
    fn latency_estimate_matches_three_tiers() {
        assert_eq!(estimate_latency("down", true, true), 0.0);
        assert_eq!(estimate_latency("up", true, true), 50.0);
        assert_eq!(estimate_latency("up", true, false), 150.0);
    }

    #[tokio::test]
    async fn check_health_never_panics_without_sysfs_access() {
        let monitor = BridgeHealthMonitor::new(&BridgeConfig {
            bridge_name: "nonexistent-br".to_string(),
            wan_iface: "nonexistent-wan".to_string(),
            lan_iface: "nonexistent-lan".to_string(),
            max_history: 10,
            sample_interval_secs: 30,
        });
        let sample = monitor.check_health().await;
        assert_eq!(sample.bridge_state, "unknown");
        assert!(!sample.wan_link);
        assert!(!sample.lan_link);
    }
}
