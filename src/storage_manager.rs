//! C3: disk-pressure-aware tiered + emergency pruning of time-sharded
//! OpenSearch indices, plus a status snapshot. Follows the spawn+interval
//! background-task shape used throughout the daemon's periodic drivers.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::StorageConfig;
use crate::index_classifier::{self, Tier};
use crate::search_client::SearchClient;

#[derive(Debug, Clone, serde::Serialize)]
pub struct IndexEntry {
    pub name: String,
    pub size_bytes: u64,
    pub tier: Tier,
    pub parsed_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct StorageStatus {
    pub disk_usage_fraction: f64,
    pub total_indices: usize,
    pub tier_counts: HashMap<String, usize>,
    pub retention_days: HashMap<String, i64>,
}

pub struct StorageManager {
    search: SearchClient,
    config: StorageConfig,
}

impl StorageManager {
    pub fn new(search: SearchClient, config: StorageConfig) -> Self {
        Self { search, config }
    }

    /// `CheckDiskUsage(path?) -> fraction`. Returns the sentinel `-1.0` on
    /// failure to read the filesystem, per §4.2's status failure semantics.
    pub fn check_disk_usage(&self) -> f64 {
        Self::check_disk_usage_at(&self.config.check_path)
    }

    fn check_disk_usage_at(path: &str) -> f64 {
        let disks = sysinfo::Disks::new_with_refreshed_list();
        let target = Path::new(path);
        let best = disks
            .iter()
            .filter(|d| target.starts_with(d.mount_point()))
            .max_by_key(|d| d.mount_point().as_os_str().len());
        match best {
            Some(d) if d.total_space() > 0 => {
                let used = d.total_space().saturating_sub(d.available_space());
                used as f64 / d.total_space() as f64
            }
            Some(_) => 0.0,
            None => -1.0,
        }
    }

    /// `ListIndices() -> [IndexEntry]`. Filters system indices, enriches with
    /// tier and parsed_date, drops indices with unknown tier or no date (they
    /// are not prunable candidates). An OpenSearch listing failure returns an
    /// empty list rather than propagating.
    pub async fn list_indices(&self) -> Vec<IndexEntry> {
        match self.search.cat_indices().await {
            Ok(entries) => entries
                .into_iter()
                .filter(|e| !index_classifier::is_system_index(&e.index))
                .map(|e| IndexEntry {
                    tier: index_classifier::tier(&e.index),
                    parsed_date: index_classifier::index_date(&e.index),
                    name: e.index,
                    size_bytes: e.store_size_bytes,
                })
                .collect(),
            Err(e) => {
                tracing::warn!("storage manager: list_indices failed: {e}");
                Vec::new()
            }
        }
    }

    fn retention_days(&self, tier: Tier) -> i64 {
        match tier {
            Tier::Hot => self.config.hot_days,
            Tier::Warm => self.config.warm_days,
            Tier::Cold => self.config.cold_days,
            Tier::Unknown => self.config.cold_days,
        }
    }

    /// Tiered prune: processes `cold -> warm -> hot`; within a tier, deletes
    /// ascending-by-date indices strictly older than the tier cutoff, and
    /// stops the whole cycle as soon as disk usage drops below the normal
    /// threshold.
    pub async fn prune_tiered(&self) -> usize {
        let now = Utc::now();
        let mut candidates: Vec<IndexEntry> = self
            .list_indices()
            .await
            .into_iter()
            .filter(|e| e.tier != Tier::Unknown && e.parsed_date.is_some())
            .collect();
        candidates.sort_by_key(|e| e.parsed_date.unwrap());

        let mut deleted = 0usize;
        for tier in [Tier::Cold, Tier::Warm, Tier::Hot] {
            let cutoff = now - chrono::Duration::days(self.retention_days(tier));
            let tier_indices: Vec<&IndexEntry> =
                candidates.iter().filter(|e| e.tier == tier).collect();

            for entry in tier_indices {
                let date = entry.parsed_date.unwrap();
                if date >= cutoff {
                    // Newer than the cutoff terminates this tier.
                    break;
                }
                if self.delete_index(&entry.name).await {
                    deleted += 1;
                }
                let usage = self.check_disk_usage();
                if usage >= 0.0 && usage < self.config.disk_threshold {
                    return deleted;
                }
            }
        }
        deleted
    }

    /// Emergency prune: ignores tier boundaries, deletes oldest-first across
    /// every prunable index until usage drops below the normal threshold or
    /// the candidate list is exhausted. Logged at warning level on entry.
    pub async fn prune_emergency(&self) -> usize {
        tracing::warn!("storage manager: emergency prune triggered");
        let mut candidates: Vec<IndexEntry> = self
            .list_indices()
            .await
            .into_iter()
            .filter(|e| e.tier != Tier::Unknown && e.parsed_date.is_some())
            .collect();
        candidates.sort_by_key(|e| e.parsed_date.unwrap());

        let mut deleted = 0usize;
        for entry in &candidates {
            if self.delete_index(&entry.name).await {
                deleted += 1;
            }
            let usage = self.check_disk_usage();
            if usage >= 0.0 && usage < self.config.disk_threshold {
                return deleted;
            }
        }
        if deleted == candidates.len() && !candidates.is_empty() {
            tracing::warn!("storage manager: emergency prune exhausted all candidates");
        }
        deleted
    }

    async fn delete_index(&self, name: &str) -> bool {
        match self.search.delete_index(name).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("storage manager: failed to delete index {name}: {e}");
                false
            }
        }
    }

    /// Samples disk once; dispatches to emergency or tiered prune, or no-ops.
    /// A disk-read failure is logged and returns without action.
    pub async fn run_cycle(&self) {
        let usage = self.check_disk_usage();
        if usage < 0.0 {
            tracing::warn!("storage manager: disk usage read failed, skipping cycle");
            return;
        }
        if usage >= self.config.emergency_threshold {
            let n = self.prune_emergency().await;
            tracing::info!("storage manager: emergency prune deleted {n} indices");
        } else if usage >= self.config.disk_threshold {
            let n = self.prune_tiered().await;
            tracing::info!("storage manager: tiered prune deleted {n} indices");
        } else {
            tracing::debug!("storage manager: disk usage {usage:.3} below threshold, no-op");
        }
    }

    pub async fn status(&self) -> StorageStatus {
        let usage = self.check_disk_usage();
        let indices = self.list_indices().await;
        let mut tier_counts: HashMap<String, usize> = HashMap::new();
        for entry in &indices {
            *tier_counts
                .entry(format!("{:?}", entry.tier).to_lowercase())
                .or_insert(0) += 1;
        }
        let mut retention_days = HashMap::new();
        retention_days.insert("hot".to_string(), self.config.hot_days);
        retention_days.insert("warm".to_string(), self.config.warm_days);
        retention_days.insert("cold".to_string(), self.config.cold_days);

        StorageStatus {
            disk_usage_fraction: usage,
            total_indices: indices.len(),
            tier_counts,
            retention_days,
        }
    }
}

/// Spawn the storage manager's periodic prune cycle as a background task.
pub fn spawn_storage_cycle(manager: Arc<StorageManager>, interval_secs: u64) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            manager.run_cycle().await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_manager() -> StorageManager {
        StorageManager::new(
            SearchClient::new("http://localhost:9200"),
            StorageConfig {
                hot_days: 90,
                warm_days: 180,
                cold_days: 30,
                disk_threshold: 0.80,
                emergency_threshold: 0.90,
                check_path: "/".to_string(),
                cycle_interval_secs: 300,
            },
        )
    }

    #[test]
    fn retention_days_maps_each_tier() {
        let mgr = make_manager();
        assert_eq!(mgr.retention_days(Tier::Hot), 90);
        assert_eq!(mgr.retention_days(Tier::Warm), 180);
        assert_eq!(mgr.retention_days(Tier::Cold), 30);
    }

    #[test]
    fn disk_usage_check_never_panics_for_missing_mount() {
        let usage = StorageManager::check_disk_usage_at("/this/path/does/not/exist/anywhere");
        assert!(usage == -1.0 || (0.0..=1.0).contains(&usage));
    }
}
