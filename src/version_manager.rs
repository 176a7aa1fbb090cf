//! C8: inventories running versions of every NetTap component by querying
//! Docker, system packages, file metadata, and OpenSearch directly. Scan
//! categories run concurrently (diverges from a sequential original) since
//! they share no mutable state.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use serde_json::{Value, json};

use crate::config::VersionConfig;
use crate::search_client::SearchClient;
use crate::subprocess;

pub const NETTAP_VERSION: &str = "0.4.0";

#[derive(Debug, Clone, Serialize)]
pub struct ComponentVersion {
    pub name: String,
    pub category: String,
    pub current_version: String,
    pub install_type: String,
    pub last_checked: DateTime<Utc>,
    pub status: String,
    pub details: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct VersionInventory {
    pub versions: Vec<ComponentVersion>,
    pub last_scan: Option<DateTime<Utc>>,
    pub count: usize,
}

pub struct VersionManager {
    compose_file: String,
    cache_ttl: chrono::Duration,
    search: SearchClient,
    cache: Mutex<HashMap<String, ComponentVersion>>,
    last_scan: Mutex<Option<DateTime<Utc>>>,
}

impl VersionManager {
    pub fn new(config: &VersionConfig, search: SearchClient) -> Self {
        Self {
            compose_file: config.compose_file.clone(),
            cache_ttl: chrono::Duration::seconds(config.cache_ttl_secs),
            search,
            cache: Mutex::new(HashMap::new()),
            last_scan: Mutex::new(None),
        }
    }

    pub async fn scan_versions(&self) -> VersionInventory {
        let (core, docker, system, databases, os_info) = tokio::join!(
            scan_core(&self.compose_file),
            scan_docker_images(),
            scan_system_packages(),
            scan_databases(&self.search),
            scan_os_info(),
        );

        let mut results = Vec::new();
        results.extend(core);
        results.extend(docker);
        results.extend(system);
        results.extend(databases);
        results.extend(os_info);

        let now = Utc::now();
        {
            let mut cache = self.cache.lock().unwrap();
            cache.clear();
            for cv in &results {
                cache.insert(cv.name.clone(), cv.clone());
            }
        }
        *self.last_scan.lock().unwrap() = Some(now);

        tracing::info!("version scan complete: {} components detected", results.len());

        VersionInventory {
            count: results.len(),
            versions: results,
            last_scan: Some(now),
        }
    }

    pub async fn get_versions(&self) -> VersionInventory {
        if self.is_cache_stale() {
            return self.scan_versions().await;
        }
        let cache = self.cache.lock().unwrap();
        let versions: Vec<ComponentVersion> = cache.values().cloned().collect();
        VersionInventory {
            count: versions.len(),
            versions,
            last_scan: *self.last_scan.lock().unwrap(),
        }
    }

    pub async fn get_component(&self, name: &str) -> Option<ComponentVersion> {
        if self.cache.lock().unwrap().is_empty() {
            self.scan_versions().await;
        }
        self.cache.lock().unwrap().get(name).cloned()
    }

    fn is_cache_stale(&self) -> bool {
        match *self.last_scan.lock().unwrap() {
            None => true,
            Some(last) => Utc::now() - last > self.cache_ttl,
        }
    }
}

async fn scan_core(compose_file: &str) -> Vec<ComponentVersion> {
    let now = Utc::now();
    let mut results = vec![ComponentVersion {
        name: "nettap-daemon".to_string(),
        category: "core".to_string(),
        current_version: NETTAP_VERSION.to_string(),
        install_type: "cargo".to_string(),
        last_checked: now,
        status: "ok".to_string(),
        details: json!({ "source": "crate_version" }),
    }];

    let package_paths = [
        "/opt/nettap/web/package.json".to_string(),
        std::path::Path::new(compose_file)
            .parent()
            .map(|p| p.join("../web/package.json"))
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_default(),
    ];

    let mut web_version = "unknown".to_string();
    let mut web_status = "unknown".to_string();
    let mut web_details = json!({});
    for pkg_path in package_paths.iter().filter(|p| !p.is_empty()) {
        if let Ok(contents) = tokio::fs::read_to_string(pkg_path).await {
            if let Ok(data) = serde_json::from_str::<Value>(&contents) {
                web_version = data["version"].as_str().unwrap_or("unknown").to_string();
                web_status = "ok".to_string();
                web_details = json!({ "package_json": pkg_path });
                break;
            }
        }
    }
    results.push(ComponentVersion {
        name: "nettap-web".to_string(),
        category: "core".to_string(),
        current_version: web_version,
        install_type: "npm".to_string(),
        last_checked: now,
        status: web_status,
        details: web_details,
    });

    let (config_version, config_status, config_details) = match tokio::fs::metadata(compose_file).await {
        Ok(meta) => match meta.modified() {
            Ok(modified) => {
                let dt: DateTime<Utc> = modified.into();
                (
                    dt.format("%Y%m%d").to_string(),
                    "ok".to_string(),
                    json!({ "compose_file": compose_file }),
                )
            }
            Err(e) => ("unknown".to_string(), "error".to_string(), json!({ "error": e.to_string() })),
        },
        Err(_) => ("unknown".to_string(), "unknown".to_string(), json!({})),
    };
    results.push(ComponentVersion {
        name: "nettap-config".to_string(),
        category: "core".to_string(),
        current_version: config_version,
        install_type: "builtin".to_string(),
        last_checked: now,
        status: config_status,
        details: config_details,
    });

    results
}

const MALCOLM_CONTAINERS: &[&str] = &[
    "zeek", "suricata", "arkime", "opensearch", "dashboards", "logstash", "file-monitor",
    "pcap-capture", "freq", "htadmin", "nginx-proxy",
];

async fn scan_docker_images() -> Vec<ComponentVersion> {
    let now = Utc::now();
    let out = subprocess::run(
        &["docker", "ps", "--format", "{{.Names}}\t{{.Image}}\t{{.ID}}"],
        Duration::from_secs(15),
    )
    .await;

    if out.code != 0 {
        return vec![ComponentVersion {
            name: "docker".to_string(),
            category: "docker".to_string(),
            current_version: "unknown".to_string(),
            install_type: "docker".to_string(),
            last_checked: now,
            status: "error".to_string(),
            details: json!({ "error": out.stderr }),
        }];
    }

    out.stdout
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|line| {
            let parts: Vec<&str> = line.split('\t').collect();
            if parts.len() < 2 {
                return None;
            }
            let container_name = parts[0].trim();
            let image = parts[1].trim();
            let container_id = parts.get(2).map(|s| s.trim()).unwrap_or("");
            let tag = image.rsplit_once(':').map(|(_, t)| t).unwrap_or("latest");
            let component_name = MALCOLM_CONTAINERS
                .iter()
                .find(|mc| container_name.to_lowercase().contains(*mc))
                .map(|mc| mc.to_string())
                .unwrap_or_else(|| container_name.to_string());

            Some(ComponentVersion {
                name: component_name,
                category: "docker".to_string(),
                current_version: tag.to_string(),
                install_type: "docker".to_string(),
                last_checked: now,
                status: "ok".to_string(),
                details: json!({
                    "image": image,
                    "container_name": container_name,
                    "container_id": container_id,
                }),
            })
        })
        .collect()
}

async fn scan_system_packages() -> Vec<ComponentVersion> {
    let now = Utc::now();
    let packages: &[(&str, &[&str], &str)] = &[
        ("zeek", &["zeek", "--version"], r"(\d+\.\d+(?:\.\d+)?)"),
        ("suricata", &["suricata", "--build-info"], r"Suricata\s+(\d+\.\d+(?:\.\d+)?)"),
        ("tshark", &["tshark", "--version"], r"TShark.*?(\d+\.\d+(?:\.\d+)?)"),
        ("python3", &["python3", "--version"], r"Python\s+(\d+\.\d+(?:\.\d+)?)"),
        ("node", &["node", "--version"], r"v?(\d+\.\d+(?:\.\d+)?)"),
        ("docker", &["docker", "--version"], r"(\d+\.\d+(?:\.\d+)?)"),
        ("docker-compose", &["docker", "compose", "version"], r"(\d+\.\d+(?:\.\d+)?)"),
    ];

    let mut results = Vec::new();
    for (name, cmd, version_re) in packages {
        let out = subprocess::run(cmd, Duration::from_secs(15)).await;
        let (version, status, details) = if out.code == 0 && !out.stdout.is_empty() {
            let matched = Regex::new(version_re).ok().and_then(|re| {
                re.captures(&out.stdout)
                    .and_then(|c| c.get(1))
                    .map(|m| m.as_str().to_string())
            });
            match matched {
                Some(v) => (v, "ok".to_string(), json!({ "raw_output": truncate(&out.stdout, 200) })),
                None => (
                    "unknown".to_string(),
                    "unknown".to_string(),
                    json!({ "raw_output": truncate(&out.stdout, 200) }),
                ),
            }
        } else {
            ("unknown".to_string(), "unknown".to_string(), json!({}))
        };
        results.push(ComponentVersion {
            name: name.to_string(),
            category: "system".to_string(),
            current_version: version,
            install_type: "apt".to_string(),
            last_checked: now,
            status,
            details,
        });
    }
    results
}

fn truncate(s: &str, n: usize) -> String {
    s.trim().chars().take(n).collect()
}

async fn scan_databases(search: &SearchClient) -> Vec<ComponentVersion> {
    let now = Utc::now();
    let mut results = Vec::new();

    let rule_paths = [
        "/var/lib/suricata/rules/suricata.rules",
        "/opt/nettap/config/suricata/rules/suricata.rules",
    ];
    let mut rules_version = "unknown".to_string();
    let mut rules_status = "unknown".to_string();
    let mut rules_details = json!({});
    for path in rule_paths {
        if let Ok(meta) = tokio::fs::metadata(path).await {
            if let Ok(modified) = meta.modified() {
                let dt: DateTime<Utc> = modified.into();
                rules_version = dt.format("%Y-%m-%d").to_string();
                rules_status = "ok".to_string();
                rules_details = json!({ "rule_file": path });
                break;
            }
        }
    }
    results.push(ComponentVersion {
        name: "suricata-rules".to_string(),
        category: "database".to_string(),
        current_version: rules_version,
        install_type: "builtin".to_string(),
        last_checked: now,
        status: rules_status,
        details: rules_details,
    });

    let geoip_env = std::env::var("GEOIP_DB_PATH").ok();
    let geoip_paths: Vec<String> = geoip_env
        .into_iter()
        .chain([
            "/usr/share/GeoIP/GeoLite2-City.mmdb".to_string(),
            "/opt/nettap/data/GeoLite2-City.mmdb".to_string(),
        ])
        .collect();
    let mut geoip_version = "unknown".to_string();
    let mut geoip_status = "unknown".to_string();
    let mut geoip_details = json!({});
    for path in &geoip_paths {
        if let Ok(meta) = tokio::fs::metadata(path).await {
            if let Ok(modified) = meta.modified() {
                let dt: DateTime<Utc> = modified.into();
                geoip_version = dt.format("%Y-%m-%d").to_string();
                geoip_status = "ok".to_string();
                geoip_details = json!({ "db_file": path });
                break;
            }
        }
    }
    results.push(ComponentVersion {
        name: "geoip-db".to_string(),
        category: "database".to_string(),
        current_version: geoip_version,
        install_type: "builtin".to_string(),
        last_checked: now,
        status: geoip_status,
        details: geoip_details,
    });

    let (os_version, os_status, os_details) = match search.info().await {
        Ok(data) => (
            data["version"]["number"].as_str().unwrap_or("unknown").to_string(),
            "ok".to_string(),
            json!({
                "cluster_name": data["cluster_name"].as_str().unwrap_or(""),
                "distribution": data["version"]["distribution"].as_str().unwrap_or("opensearch"),
            }),
        ),
        Err(e) => ("unknown".to_string(), "error".to_string(), json!({ "error": e.to_string() })),
    };
    results.push(ComponentVersion {
        name: "opensearch".to_string(),
        category: "database".to_string(),
        current_version: os_version,
        install_type: "docker".to_string(),
        last_checked: now,
        status: os_status,
        details: os_details,
    });

    results
}

async fn scan_os_info() -> Vec<ComponentVersion> {
    let now = Utc::now();
    let mut results = Vec::new();

    let (os_version, os_status, os_details) = match tokio::fs::read_to_string("/etc/os-release").await {
        Ok(content) => {
            let mut version = "unknown".to_string();
            let mut name = "unknown".to_string();
            for line in content.lines() {
                if let Some(v) = line.strip_prefix("VERSION_ID=") {
                    version = v.trim_matches('"').to_string();
                } else if let Some(v) = line.strip_prefix("PRETTY_NAME=") {
                    name = v.trim_matches('"').to_string();
                }
            }
            (version, "ok".to_string(), json!({ "pretty_name": name }))
        }
        Err(e) => ("unknown".to_string(), "unknown".to_string(), json!({ "error": e.to_string() })),
    };
    results.push(ComponentVersion {
        name: "os".to_string(),
        category: "os".to_string(),
        current_version: os_version,
        install_type: "builtin".to_string(),
        last_checked: now,
        status: os_status,
        details: os_details,
    });

    let out = subprocess::run(&["uname", "-r"], Duration::from_secs(15)).await;
    let (kernel_version, kernel_status) = if out.code == 0 {
        (out.stdout.trim().to_string(), "ok".to_string())
    } else {
        ("unknown".to_string(), "unknown".to_string())
    };
    results.push(ComponentVersion {
        name: "kernel".to_string(),
        category: "os".to_string(),
        current_version: kernel_version,
        install_type: "builtin".to_string(),
        last_checked: now,
        status: kernel_status,
        details: json!({}),
    });

    results
}

/// Tolerant semver parse: strips a leading `v`, splits off a `-`/`+`
/// pre-release/build suffix, pads missing minor/patch with 0.
pub fn parse_version(version_str: &str) -> Option<(u64, u64, u64)> {
    let s = version_str.trim().strip_prefix('v').unwrap_or(version_str.trim());
    let core = s.split(['-', '+']).next().unwrap_or(s);
    let mut parts = core.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let patch = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    Some((major, minor, patch))
}

/// Returns "major"/"minor"/"patch"/"same"/"unknown" describing how `latest`
/// relates to `current`.
pub fn compare_versions(current: &str, latest: &str) -> &'static str {
    let (Some(c), Some(l)) = (parse_version(current), parse_version(latest)) else {
        return "unknown";
    };
    if l.0 > c.0 {
        "major"
    } else if l.0 == c.0 && l.1 > c.1 {
        "minor"
    } else if l.0 == c.0 && l.1 == c.1 && l.2 > c.2 {
        "patch"
    } else if l == c {
        "same"
    } else {
        "unknown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_version_tolerates_v_prefix_and_missing_segments() {
        assert_eq!(parse_version("v1.2.3"), Some((1, 2, 3)));
        assert_eq!(parse_version("1.2"), Some((1, 2, 0)));
        assert_eq!(parse_version("1"), Some((1, 0, 0)));
        assert_eq!(parse_version("v2.0.0-rc1"), Some((2, 0, 0)));
        assert_eq!(parse_version("garbage"), None);
    }

    #[test]
    fn compare_versions_is_anti_symmetric() {
        assert_eq!(compare_versions("1.0.0", "2.0.0"), "major");
        assert_eq!(compare_versions("2.0.0", "1.0.0"), "unknown");
        assert_eq!(compare_versions("1.0.0", "1.1.0"), "minor");
        assert_eq!(compare_versions("1.0.0", "1.0.1"), "patch");
        assert_eq!(compare_versions("1.0.0", "1.0.0"), "same");
        assert_eq!(compare_versions("garbage", "1.0.0"), "unknown");
    }
}
