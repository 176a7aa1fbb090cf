//! C11: persistent JSON stores. `PersistentMap<K, V>` is the single
//! abstraction — atomic load/save behind a mutex, write-then-rename — shared
//! by alert acks, device baseline, investigations, and report schedules.

use std::collections::HashMap;
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::models::{AckInfo, BaselineInfo, Investigation, ReportSchedule};

/// Generic map persisted as pretty-printed JSON. `Load` tolerates a missing
/// or corrupt file by returning empty and logging a warning; it never fails
/// startup. `Save` writes to a sibling temp file and renames over the target
/// for crash safety.
pub struct PersistentMap<K, V> {
    path: PathBuf,
    data: Mutex<HashMap<K, V>>,
}

impl<K, V> PersistentMap<K, V>
where
    K: Eq + Hash + Clone + Serialize + DeserializeOwned,
    V: Clone + Serialize + DeserializeOwned,
{
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let data = match std::fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(map) => map,
                Err(e) => {
                    tracing::warn!("store: corrupt json at {}: {e} — starting empty", path.display());
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Self {
            path,
            data: Mutex::new(data),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.data.lock().unwrap().get(key).cloned()
    }

    pub fn all(&self) -> HashMap<K, V> {
        self.data.lock().unwrap().clone()
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        let mut guard = self.data.lock().unwrap();
        let removed = guard.remove(key);
        if removed.is_some() {
            self.save_locked(&guard);
        }
        removed
    }

    /// Inserts under the store's mutex and saves before releasing it, so no
    /// read-modify-write reordering is visible to concurrent callers.
    pub fn set(&self, key: K, value: V) {
        let mut guard = self.data.lock().unwrap();
        guard.insert(key, value);
        self.save_locked(&guard);
    }

    fn save_locked(&self, data: &HashMap<K, V>) {
        let Some(parent) = self.path.parent() else { return };
        if let Err(e) = std::fs::create_dir_all(parent) {
            tracing::warn!("store: could not create parent dir for {}: {e}", self.path.display());
            return;
        }
        let contents = match serde_json::to_string_pretty(data) {
            Ok(c) => c,
            Err(e) => {
                tracing::error!("store: failed to serialize {}: {e}", self.path.display());
                return;
            }
        };
        let tmp_path = self.path.with_extension("json.tmp");
        if let Err(e) = std::fs::write(&tmp_path, contents) {
            tracing::warn!("store: failed to write {}: {e}", tmp_path.display());
            return;
        }
        if let Err(e) = std::fs::rename(&tmp_path, &self.path) {
            tracing::warn!("store: failed to rename into {}: {e}", self.path.display());
        }
    }
}

pub type AckStore = PersistentMap<String, AckInfo>;
pub type BaselineStore = PersistentMap<String, BaselineInfo>;
pub type InvestigationStore = PersistentMap<String, Investigation>;
pub type ScheduleStore = PersistentMap<String, ReportSchedule>;

impl BaselineStore {
    /// Adding a MAC stores it uppercase regardless of input case; a duplicate
    /// add overwrites the prior record without inflating the count.
    pub fn upsert(&self, mac: &str, info: BaselineInfo) {
        self.set(mac.to_uppercase(), info);
    }

    /// Case-insensitive remove.
    pub fn remove_case_insensitive(&self, mac: &str) -> Option<BaselineInfo> {
        self.remove(&mac.to_uppercase())
    }
}

impl AckStore {
    /// Acknowledging the same id twice with different `acknowledged_by`
    /// keeps only the last value.
    pub fn acknowledge(&self, alert_id: &str, acknowledged_by: &str) {
        self.set(
            alert_id.to_string(),
            AckInfo {
                acknowledged: true,
                acknowledged_by: acknowledged_by.to_string(),
                acknowledged_at: chrono::Utc::now(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("nettap-store-test-{name}-{}.json", std::process::id()))
    }

    #[test]
    fn save_then_load_round_trips() {
        let path = tmp_path("roundtrip");
        let _ = std::fs::remove_file(&path);

        let store: PersistentMap<String, AckInfo> = PersistentMap::load(&path);
        store.acknowledge("alert-1", "alice");

        let reloaded: PersistentMap<String, AckInfo> = PersistentMap::load(&path);
        let ack = reloaded.get(&"alert-1".to_string()).unwrap();
        assert_eq!(ack.acknowledged_by, "alice");

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_or_corrupt_file_yields_empty_without_panicking() {
        let missing: PersistentMap<String, AckInfo> = PersistentMap::load("/nonexistent/path/acks.json");
        assert!(missing.all().is_empty());

        let corrupt_path = tmp_path("corrupt");
        std::fs::write(&corrupt_path, "not json").unwrap();
        let corrupt: PersistentMap<String, AckInfo> = PersistentMap::load(&corrupt_path);
        assert!(corrupt.all().is_empty());
        let _ = std::fs::remove_file(&corrupt_path);
    }

    #[test]
    fn acknowledging_twice_keeps_only_last_value() {
        let path = tmp_path("ack-twice");
        let _ = std::fs::remove_file(&path);
        let store: AckStore = PersistentMap::load(&path);
        store.acknowledge("a1", "alice");
        store.acknowledge("a1", "bob");
        assert_eq!(store.get(&"a1".to_string()).unwrap().acknowledged_by, "bob");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn baseline_upsert_stores_uppercase_and_remove_is_case_insensitive() {
        let path = tmp_path("baseline");
        let _ = std::fs::remove_file(&path);
        let store: BaselineStore = PersistentMap::load(&path);
        store.upsert(
            "aa:bb:cc:dd:ee:ff",
            BaselineInfo {
                manufacturer: Some("Acme".to_string()),
                hostname: None,
                first_seen: chrono::Utc::now(),
                notes: None,
            },
        );
        assert!(store.get(&"AA:BB:CC:DD:EE:FF".to_string()).is_some());
        assert_eq!(store.all().len(), 1);

        store.upsert(
            "AA:BB:CC:DD:EE:FF",
            BaselineInfo {
                manufacturer: Some("Acme Updated".to_string()),
                hostname: None,
                first_seen: chrono::Utc::now(),
                notes: None,
            },
        );
        assert_eq!(store.all().len(), 1);

        assert!(store.remove_case_insensitive("aa:bb:cc:dd:ee:ff").is_some());
        assert!(store.all().is_empty());
        let _ = std::fs::remove_file(&path);
    }
}
