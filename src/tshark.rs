//! C7: subprocess gateway for packet-capture inspection via a sandboxed
//! TShark container. All validation happens before any subprocess runs;
//! TShark itself is always invoked through `docker exec`, argv-list only.

use std::collections::HashMap;
use std::path::{Component, Path};
use std::sync::LazyLock;
use std::sync::Mutex;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::config::TSharkConfig;
use crate::error::NetTapError;
use crate::subprocess;

const ALLOWED_OUTPUT_FORMATS: &[&str] = &["json", "text", "pdml"];
static ALLOWED_FIELD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9_.]+$").unwrap());
static SHELL_METACHAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[;`$"'\n\r\x00]"#).unwrap());

#[derive(Debug, Clone, Default)]
pub struct TSharkRequest {
    pub pcap_path: String,
    pub display_filter: String,
    pub max_packets: u32,
    pub output_format: String,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TSharkResult {
    pub packets: Vec<Value>,
    pub packet_count: usize,
    pub truncated: bool,
    pub tshark_version: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProtocolInfo {
    pub name: String,
    pub short_name: String,
    pub filter_name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldInfo {
    pub name: String,
    pub abbreviation: String,
    pub field_type: String,
}

/// Validates and normalizes a pcap path. Absolute paths must resolve under
/// `pcap_base_dir`; relative paths must not contain `..`. Either way the
/// result is rewritten to the container's mount path and must end in a
/// recognized capture extension.
pub fn validate_pcap_path(pcap_path: &str, pcap_base_dir: &str) -> Result<String, NetTapError> {
    const PCAP_MOUNT_PATH: &str = "/pcap";

    let candidate = Path::new(pcap_path);
    let relative = if candidate.is_absolute() {
        let base = Path::new(pcap_base_dir);
        candidate
            .strip_prefix(base)
            .map_err(|_| NetTapError::Validation(format!("pcap path {pcap_path} is outside the allowed directory")))?
    } else {
        if candidate
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(NetTapError::Validation(format!(
                "pcap path {pcap_path} contains parent directory traversal"
            )));
        }
        candidate
    };

    if relative
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(NetTapError::Validation(format!(
            "pcap path {pcap_path} contains parent directory traversal"
        )));
    }

    let container_path = format!("{PCAP_MOUNT_PATH}/{}", relative.to_string_lossy());
    let lower = container_path.to_lowercase();
    if !(lower.ends_with(".pcap") || lower.ends_with(".pcapng") || lower.ends_with(".cap")) {
        return Err(NetTapError::Validation(format!(
            "pcap path {pcap_path} must end in .pcap, .pcapng, or .cap"
        )));
    }

    Ok(container_path)
}

pub fn validate_display_filter(display_filter: &str) -> Result<(), NetTapError> {
    if display_filter.is_empty() {
        return Ok(());
    }
    if SHELL_METACHAR_PATTERN.is_match(display_filter) {
        return Err(NetTapError::Validation(
            "display filter contains disallowed characters".to_string(),
        ));
    }
    if display_filter.len() > 500 {
        return Err(NetTapError::Validation(
            "display filter exceeds 500 characters".to_string(),
        ));
    }
    Ok(())
}

pub fn validate_fields(fields: &[String]) -> Result<(), NetTapError> {
    if fields.len() > 50 {
        return Err(NetTapError::Validation("too many fields requested".to_string()));
    }
    for field in fields {
        if !ALLOWED_FIELD_PATTERN.is_match(field) {
            return Err(NetTapError::Validation(format!("invalid field name: {field}")));
        }
    }
    Ok(())
}

/// Full request validation, including clamping `max_packets` to [1,1000].
pub fn validate_request(
    request: &TSharkRequest,
    pcap_base_dir: &str,
) -> Result<(String, u32), NetTapError> {
    let container_path = validate_pcap_path(&request.pcap_path, pcap_base_dir)?;
    validate_display_filter(&request.display_filter)?;
    validate_fields(&request.fields)?;
    if !ALLOWED_OUTPUT_FORMATS.contains(&request.output_format.as_str()) {
        return Err(NetTapError::Validation(format!(
            "unsupported output format: {}",
            request.output_format
        )));
    }
    let max_packets = request.max_packets.clamp(1, 1000);
    Ok((container_path, max_packets))
}

fn build_command<'a>(
    container: &'a str,
    container_path: &'a str,
    max_packets_str: &'a str,
    request: &'a TSharkRequest,
) -> Vec<&'a str> {
    let mut cmd = vec!["docker", "exec", container, "tshark", "-r", container_path, "-c", max_packets_str];
    if !request.display_filter.is_empty() {
        cmd.push("-Y");
        cmd.push(&request.display_filter);
    }
    if !request.fields.is_empty() {
        cmd.push("-T");
        cmd.push("fields");
        for field in &request.fields {
            cmd.push("-e");
            cmd.push(field);
        }
        cmd.push("-E");
        cmd.push("header=y");
        cmd.push("-E");
        cmd.push("separator=,");
    } else {
        match request.output_format.as_str() {
            "json" => {
                cmd.push("-T");
                cmd.push("json");
            }
            "pdml" => {
                cmd.push("-T");
                cmd.push("pdml");
            }
            _ => {}
        }
    }
    cmd
}

pub struct TSharkService {
    config: TSharkConfig,
    version_cache: Mutex<Option<String>>,
    protocols_cache: Mutex<Option<Vec<ProtocolInfo>>>,
    fields_cache: Mutex<HashMap<String, Vec<FieldInfo>>>,
}

impl TSharkService {
    pub fn new(config: TSharkConfig) -> Self {
        Self {
            config,
            version_cache: Mutex::new(None),
            protocols_cache: Mutex::new(None),
            fields_cache: Mutex::new(HashMap::new()),
        }
    }

    pub async fn analyze(&self, request: TSharkRequest) -> Result<TSharkResult, NetTapError> {
        let (container_path, max_packets) = validate_request(&request, &self.config.pcap_base_dir)?;
        let max_packets_str = max_packets.to_string();
        let argv = build_command(&self.config.container, &container_path, &max_packets_str, &request);
        let timeout = Duration::from_secs(self.config.execution_timeout_secs);
        let output = subprocess::run(&argv, timeout).await;

        if output.code != 0 && output.stdout.is_empty() {
            return Ok(TSharkResult {
                packets: Vec::new(),
                packet_count: 0,
                truncated: false,
                tshark_version: None,
                error: Some(if output.stderr.is_empty() {
                    format!("tshark exited with code {}", output.code)
                } else {
                    output.stderr.clone()
                }),
            });
        }

        let truncated = output.stdout.len() >= self.config.max_output_bytes;
        let packets = match request.fields.is_empty().then_some(request.output_format.as_str()) {
            Some("json") => parse_json_output(&output.stdout),
            _ if !request.fields.is_empty() => Vec::new(),
            _ => parse_text_output(&output.stdout),
        };

        Ok(TSharkResult {
            packet_count: packets.len(),
            packets,
            truncated,
            tshark_version: None,
            error: None,
        })
    }

    pub async fn get_version(&self) -> Option<String> {
        if let Some(v) = self.version_cache.lock().unwrap().clone() {
            return Some(v);
        }
        let out = subprocess::run(
            &["docker", "exec", &self.config.container, "tshark", "--version"],
            Duration::from_secs(5),
        )
        .await;
        if out.code != 0 {
            return None;
        }
        let version = out.stdout.lines().next().map(|s| s.to_string());
        *self.version_cache.lock().unwrap() = version.clone();
        version
    }

    pub async fn is_available(&self) -> bool {
        let out = subprocess::run(
            &[
                "docker",
                "inspect",
                "--format",
                "{{.State.Running}}",
                &self.config.container,
            ],
            Duration::from_secs(5),
        )
        .await;
        out.code == 0 && out.stdout.trim() == "true"
    }

    pub async fn validate_filter_dry_run(&self, display_filter: &str) -> bool {
        if validate_display_filter(display_filter).is_err() {
            return false;
        }
        let out = subprocess::run(
            &[
                "docker",
                "exec",
                &self.config.container,
                "tshark",
                "-Y",
                display_filter,
                "-r",
                "/dev/null",
            ],
            Duration::from_secs(self.config.execution_timeout_secs),
        )
        .await;
        out.code == 0
    }

    /// `tshark -G protocols` dumps `name\tshort_name\tfilter_name` per line; cached for the process lifetime.
    pub async fn list_protocols(&self) -> Vec<ProtocolInfo> {
        if let Some(cached) = self.protocols_cache.lock().unwrap().clone() {
            return cached;
        }
        let out = subprocess::run(
            &["docker", "exec", &self.config.container, "tshark", "-G", "protocols"],
            Duration::from_secs(self.config.execution_timeout_secs),
        )
        .await;
        if out.code != 0 {
            return Vec::new();
        }
        let protocols: Vec<ProtocolInfo> = out
            .stdout
            .lines()
            .filter_map(|line| {
                let mut parts = line.splitn(3, '\t');
                Some(ProtocolInfo {
                    name: parts.next()?.to_string(),
                    short_name: parts.next()?.to_string(),
                    filter_name: parts.next()?.to_string(),
                })
            })
            .collect();
        *self.protocols_cache.lock().unwrap() = Some(protocols.clone());
        protocols
    }

    /// `tshark -G fields` dumps one record per line tagged `F\tname\tabbrev\ttype\t...`;
    /// results are cached per protocol filter prefix.
    pub async fn list_fields(&self, protocol: &str) -> Result<Vec<FieldInfo>, NetTapError> {
        validate_fields(std::slice::from_ref(&protocol.to_string()))?;
        if let Some(cached) = self.fields_cache.lock().unwrap().get(protocol).cloned() {
            return Ok(cached);
        }
        let out = subprocess::run(
            &["docker", "exec", &self.config.container, "tshark", "-G", "fields"],
            Duration::from_secs(self.config.execution_timeout_secs),
        )
        .await;
        if out.code != 0 {
            return Ok(Vec::new());
        }
        let prefix = format!("{protocol}.");
        let fields: Vec<FieldInfo> = out
            .stdout
            .lines()
            .filter(|line| line.starts_with('F'))
            .filter_map(|line| {
                let mut parts = line.split('\t');
                parts.next()?; // leading "F" tag
                let name = parts.next()?.to_string();
                let abbreviation = parts.next()?.to_string();
                let field_type = parts.next()?.to_string();
                (abbreviation == protocol || abbreviation.starts_with(&prefix)).then_some(FieldInfo {
                    name,
                    abbreviation,
                    field_type,
                })
            })
            .collect();
        self.fields_cache
            .lock()
            .unwrap()
            .insert(protocol.to_string(), fields.clone());
        Ok(fields)
    }
}

fn parse_json_output(stdout: &str) -> Vec<Value> {
    match serde_json::from_str::<Value>(stdout) {
        Ok(Value::Array(items)) => items,
        Ok(single) => vec![single],
        Err(e) => {
            tracing::warn!("tshark: failed to parse json output: {e}");
            Vec::new()
        }
    }
}

fn parse_text_output(stdout: &str) -> Vec<Value> {
    stdout
        .lines()
        .enumerate()
        .map(|(i, line)| serde_json::json!({ "no": i + 1, "raw": line }))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_s4_path_traversal_rejected() {
        let err = validate_pcap_path("../../etc/passwd", "/opt/nettap/pcap");
        assert!(err.is_err());
    }

    #[test]
    fn relative_path_without_traversal_is_accepted() {
        let result = validate_pcap_path("capture.pcap", "/opt/nettap/pcap").unwrap();
        assert_eq!(result, "/pcap/capture.pcap");
    }

    #[test]
    fn absolute_path_under_base_dir_is_accepted() {
        let result = validate_pcap_path("/opt/nettap/pcap/sub/capture.pcapng", "/opt/nettap/pcap").unwrap();
        assert_eq!(result, "/pcap/sub/capture.pcapng");
    }

    #[test]
    fn absolute_path_outside_base_dir_is_rejected() {
        assert!(validate_pcap_path("/etc/passwd.pcap", "/opt/nettap/pcap").is_err());
    }

    #[test]
    fn wrong_extension_is_rejected() {
        assert!(validate_pcap_path("capture.txt", "/opt/nettap/pcap").is_err());
    }

    #[test]
    fn display_filter_rejects_shell_metacharacters() {
        assert!(validate_display_filter("tcp.port == 80; rm -rf /").is_err());
        assert!(validate_display_filter("tcp.port == 80 && ip.addr == 10.0.0.1").is_ok());
    }

    #[test]
    fn fields_must_match_allowed_pattern() {
        assert!(validate_fields(&["ip.src".to_string()]).is_ok());
        assert!(validate_fields(&["ip.src; DROP".to_string()]).is_err());
    }

    #[test]
    fn max_packets_is_clamped_to_bounds() {
        let request = TSharkRequest {
            pcap_path: "capture.pcap".to_string(),
            display_filter: String::new(),
            max_packets: 999_999,
            output_format: "json".to_string(),
            fields: Vec::new(),
        };
        let (_, max_packets) = validate_request(&request, "/opt/nettap/pcap").unwrap();
        assert_eq!(max_packets, 1000);
    }
}
