use serde::Deserialize;
use std::path::Path;

/// Top-level config loaded from `nettap.toml`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct NetTapConfig {
    #[serde(default)]
    pub opensearch: OpenSearchConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub internet: InternetConfig,
    #[serde(default)]
    pub tshark: TSharkConfig,
    #[serde(default)]
    pub version: VersionConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenSearchConfig {
    #[serde(default = "default_opensearch_url")]
    pub url: String,
}

impl Default for OpenSearchConfig {
    fn default() -> Self {
        Self {
            url: default_opensearch_url(),
        }
    }
}

fn default_opensearch_url() -> String {
    "http://localhost:9200".to_string()
}

/// Retention policy and disk-pressure thresholds for the storage manager (C3).
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_hot_days")]
    pub hot_days: i64,
    #[serde(default = "default_warm_days")]
    pub warm_days: i64,
    #[serde(default = "default_cold_days")]
    pub cold_days: i64,
    #[serde(default = "default_disk_threshold")]
    pub disk_threshold: f64,
    #[serde(default = "default_emergency_threshold")]
    pub emergency_threshold: f64,
    #[serde(default = "default_check_path")]
    pub check_path: String,
    #[serde(default = "default_cycle_interval_secs")]
    pub cycle_interval_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            hot_days: default_hot_days(),
            warm_days: default_warm_days(),
            cold_days: default_cold_days(),
            disk_threshold: default_disk_threshold(),
            emergency_threshold: default_emergency_threshold(),
            check_path: default_check_path(),
            cycle_interval_secs: default_cycle_interval_secs(),
        }
    }
}

fn default_hot_days() -> i64 {
    90
}
fn default_warm_days() -> i64 {
    180
}
fn default_cold_days() -> i64 {
    30
}
fn default_disk_threshold() -> f64 {
    0.80
}
fn default_emergency_threshold() -> f64 {
    0.90
}
fn default_check_path() -> String {
    "/".to_string()
}
fn default_cycle_interval_secs() -> u64 {
    300
}

/// Bridge health monitor (C6a) sampling configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    #[serde(default = "default_bridge_name")]
    pub bridge_name: String,
    #[serde(default = "default_wan_iface")]
    pub wan_iface: String,
    #[serde(default = "default_lan_iface")]
    pub lan_iface: String,
    #[serde(default = "default_bridge_max_history")]
    pub max_history: usize,
    #[serde(default = "default_bridge_interval_secs")]
    pub sample_interval_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bridge_name: default_bridge_name(),
            wan_iface: default_wan_iface(),
            lan_iface: default_lan_iface(),
            max_history: default_bridge_max_history(),
            sample_interval_secs: default_bridge_interval_secs(),
        }
    }
}

fn default_bridge_name() -> String {
    "br0".to_string()
}
fn default_wan_iface() -> String {
    "eth0".to_string()
}
fn default_lan_iface() -> String {
    "eth1".to_string()
}
fn default_bridge_max_history() -> usize {
    2880
}
fn default_bridge_interval_secs() -> u64 {
    30
}

/// Internet health monitor (C6b) probe configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct InternetConfig {
    #[serde(default = "default_ping_targets")]
    pub ping_targets: Vec<String>,
    #[serde(default = "default_dns_targets")]
    pub dns_targets: Vec<String>,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_internet_max_history")]
    pub max_history: usize,
    #[serde(default = "default_internet_interval_secs")]
    pub sample_interval_secs: u64,
}

impl Default for InternetConfig {
    fn default() -> Self {
        Self {
            ping_targets: default_ping_targets(),
            dns_targets: default_dns_targets(),
            probe_timeout_secs: default_probe_timeout_secs(),
            max_history: default_internet_max_history(),
            sample_interval_secs: default_internet_interval_secs(),
        }
    }
}

fn default_ping_targets() -> Vec<String> {
    vec!["1.1.1.1".to_string(), "8.8.8.8".to_string()]
}
fn default_dns_targets() -> Vec<String> {
    vec!["cloudflare.com".to_string()]
}
fn default_probe_timeout_secs() -> u64 {
    5
}
fn default_internet_max_history() -> usize {
    2880
}
fn default_internet_interval_secs() -> u64 {
    30
}

/// Subprocess gateway (C7) configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TSharkConfig {
    #[serde(default = "default_tshark_container")]
    pub container: String,
    #[serde(default = "default_pcap_base_dir")]
    pub pcap_base_dir: String,
    #[serde(default = "default_tshark_timeout_secs")]
    pub execution_timeout_secs: u64,
    #[serde(default = "default_tshark_max_output_bytes")]
    pub max_output_bytes: usize,
}

impl Default for TSharkConfig {
    fn default() -> Self {
        Self {
            container: default_tshark_container(),
            pcap_base_dir: default_pcap_base_dir(),
            execution_timeout_secs: default_tshark_timeout_secs(),
            max_output_bytes: default_tshark_max_output_bytes(),
        }
    }
}

fn default_tshark_container() -> String {
    "nettap-tshark".to_string()
}
fn default_pcap_base_dir() -> String {
    "/opt/nettap/pcap".to_string()
}
fn default_tshark_timeout_secs() -> u64 {
    30
}
fn default_tshark_max_output_bytes() -> usize {
    5 * 1024 * 1024
}

/// Version manager (C8) configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionConfig {
    #[serde(default = "default_compose_file")]
    pub compose_file: String,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: i64,
    #[serde(default = "default_github_repo")]
    pub github_repo: String,
}

impl Default for VersionConfig {
    fn default() -> Self {
        Self {
            compose_file: default_compose_file(),
            cache_ttl_secs: default_cache_ttl_secs(),
            github_repo: default_github_repo(),
        }
    }
}

fn default_compose_file() -> String {
    "/opt/nettap/docker/docker-compose.yml".to_string()
}
fn default_cache_ttl_secs() -> i64 {
    600
}
fn default_github_repo() -> String {
    "EliasMarine/NetTap".to_string()
}

/// Filesystem locations for the persistent JSON stores (C11) and backups.
#[derive(Debug, Clone, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_alert_ack_file")]
    pub alert_ack_file: String,
    #[serde(default = "default_baseline_file")]
    pub baseline_file: String,
    #[serde(default = "default_investigations_file")]
    pub investigations_file: String,
    #[serde(default = "default_schedules_file")]
    pub schedules_file: String,
    #[serde(default = "default_detection_packs_file")]
    pub detection_packs_file: String,
    #[serde(default = "default_backup_dir")]
    pub backup_dir: String,
    #[serde(default = "default_geoip_db_path")]
    pub geoip_db_path: String,
    #[serde(default = "default_suricata_descriptions_file")]
    pub suricata_descriptions_file: String,
    #[serde(default = "default_oui_file")]
    pub oui_file: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            alert_ack_file: default_alert_ack_file(),
            baseline_file: default_baseline_file(),
            investigations_file: default_investigations_file(),
            schedules_file: default_schedules_file(),
            detection_packs_file: default_detection_packs_file(),
            backup_dir: default_backup_dir(),
            geoip_db_path: default_geoip_db_path(),
            suricata_descriptions_file: default_suricata_descriptions_file(),
            oui_file: default_oui_file(),
        }
    }
}

fn default_alert_ack_file() -> String {
    "/opt/nettap/data/alert_acks.json".to_string()
}
fn default_baseline_file() -> String {
    "/opt/nettap/data/device_baseline.json".to_string()
}
fn default_investigations_file() -> String {
    "/opt/nettap/data/investigations.json".to_string()
}
fn default_schedules_file() -> String {
    "/opt/nettap/data/report_schedules.json".to_string()
}
fn default_detection_packs_file() -> String {
    "/opt/nettap/data/detection_packs.json".to_string()
}
fn default_backup_dir() -> String {
    "/opt/nettap/backups".to_string()
}
fn default_geoip_db_path() -> String {
    "/opt/nettap/data/GeoLite2-City.mmdb".to_string()
}
fn default_suricata_descriptions_file() -> String {
    "/opt/nettap/config/suricata_descriptions.json".to_string()
}
fn default_oui_file() -> String {
    "/opt/nettap/config/oui.txt".to_string()
}

impl NetTapConfig {
    /// Load config from a TOML file. Returns defaults if the file doesn't exist.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("config file not found at {}, using defaults", path.display());
            return Ok(Self::apply_env_overrides(Self::default()));
        }
        let contents = std::fs::read_to_string(path)?;
        let config: NetTapConfig = toml::from_str(&contents)?;
        tracing::info!("loaded config from {}", path.display());
        Ok(Self::apply_env_overrides(config))
    }

    /// Environment variables take precedence over file/default values, per the
    /// daemon's external-interfaces contract.
    fn apply_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("OPENSEARCH_URL") {
            self.opensearch.url = v;
        }
        if let Ok(v) = std::env::var("GEOIP_DB_PATH") {
            self.paths.geoip_db_path = v;
        }
        if let Ok(v) = std::env::var("ALERT_ACK_FILE") {
            self.paths.alert_ack_file = v;
        }
        if let Ok(v) = std::env::var("NETTAP_BRIDGE_NAME") {
            self.bridge.bridge_name = v;
        }
        if let Ok(v) = std::env::var("NETTAP_WAN_IFACE") {
            self.bridge.wan_iface = v;
        }
        if let Ok(v) = std::env::var("NETTAP_LAN_IFACE") {
            self.bridge.lan_iface = v;
        }
        if let Ok(v) = std::env::var("NETTAP_COMPOSE_FILE") {
            self.version.compose_file = v;
        }
        self
    }
}
