//! Translates Suricata signature names into plain-English descriptions with
//! risk context and recommendations. Loads a curated SID mapping at startup
//! and falls back to ordered prefix-pattern matching for unmapped alerts.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

const PREFIX_PATTERNS: &[(&str, &str, &str)] = &[
    ("ET MALWARE", "malware", "Potential malware activity detected: {}"),
    ("ET SCAN", "scan", "Network scanning activity detected: {}"),
    ("ET TROJAN", "trojan", "Trojan horse communication detected: {}"),
    ("ET EXPLOIT", "exploit", "Exploit attempt detected: {}"),
    ("ET POLICY", "policy", "Network policy violation: {}"),
    ("ET INFO", "info", "Informational network event: {}"),
    ("ET DNS", "dns", "Suspicious DNS activity: {}"),
    ("ET WEB_SERVER", "web_server", "Web server attack detected: {}"),
    ("ET WEB_CLIENT", "web_client", "Web client vulnerability activity: {}"),
    ("ET HUNTING", "hunting", "Threat hunting indicator detected: {}"),
    ("ET CURRENT_EVENTS", "current_events", "Current threat campaign activity: {}"),
    (
        "ET ATTACK_RESPONSE",
        "attack_response",
        "Attack response or successful compromise indicator: {}",
    ),
    ("ET DOS", "dos", "Denial of service activity detected: {}"),
    ("ET DROP", "drop", "Traffic from known malicious source: {}"),
    ("GPL", "gpl", "Known threat signature matched: {}"),
];

fn recommendation_for(category: &str) -> &'static str {
    match category {
        "malware" => "Investigate the affected device for malware infection. Consider isolating it from the network and running a full antivirus scan.",
        "scan" => "This may indicate reconnaissance activity. Monitor for follow-up connection attempts and verify the scanning source is authorized.",
        "trojan" => "A device may be communicating with a command-and-control server. Immediately isolate the device and perform a thorough malware scan.",
        "exploit" => "An exploit attempt was detected. Ensure all devices and software are updated to the latest versions. Check for signs of compromise.",
        "policy" => "Review your network usage policies. This may be legitimate activity that violates organizational guidelines, or it may indicate shadow IT.",
        "info" => "This is an informational alert and may not require immediate action. Review the details to determine if the activity is expected.",
        "dns" => "Suspicious DNS activity can indicate malware, data exfiltration, or tunneling. Investigate the queried domains for known threats.",
        "web_server" => "A web server on your network may be under attack. Review server logs, ensure web applications are patched, and consider WAF protection.",
        "web_client" => "A device may have visited a malicious website or downloaded harmful content. Check browser history and scan the device for threats.",
        "hunting" => "This is a threat hunting indicator that may warrant investigation. Correlate with other alerts to determine if this is part of a broader attack.",
        "current_events" => "This alert matches a known active threat campaign. Prioritize investigation and check for indicators of compromise across your network.",
        "attack_response" => "This may indicate a successful compromise. Investigate immediately for data exfiltration, lateral movement, or persistent access.",
        "dos" => "Denial of service activity detected. Monitor bandwidth and service availability. Consider rate limiting or upstream filtering.",
        "drop" => "Traffic from a known malicious source was detected. Block this IP at your firewall and investigate any devices that communicated with it.",
        "gpl" => "A well-known threat signature was matched. Review the specific signature details and investigate the affected devices.",
        _ => "Review this alert and investigate the network activity. Check the source and destination for any signs of suspicious behavior.",
    }
}

fn category_risk_note(category: &str, severity: i64) -> Option<&'static str> {
    Some(match (category, severity) {
        ("malware", 1) => "This is a critical threat. Malware with high severity often indicates active infection with data theft or ransomware capabilities.",
        ("malware", 2) => "This is a moderate threat. The malware variant detected may be attempting to establish persistence or download additional payloads.",
        ("malware", 3) => "This is a low-severity malware indicator. It may be adware or a potentially unwanted program (PUP).",
        ("trojan", 1) => "Critical risk. An active trojan communication channel suggests the device is compromised and under remote control.",
        ("trojan", 2) => "Moderate risk. Trojan-like behavior was detected but may not yet have established a full command-and-control channel.",
        ("trojan", 3) => "Low risk. This may be a false positive or an older trojan variant with limited capabilities.",
        ("exploit", 1) => "Critical risk. A high-severity exploit attempt may lead to immediate system compromise if successful.",
        ("exploit", 2) => "Moderate risk. The exploit attempt targets a known vulnerability. Verify that affected systems are patched.",
        ("exploit", 3) => "Low risk. The exploit attempt is unlikely to succeed against properly patched systems.",
        ("scan", 1) => "Aggressive scanning from this source. This often precedes a targeted attack.",
        ("scan", 2) => "Moderate scanning activity. May be automated vulnerability assessment or reconnaissance.",
        ("scan", 3) => "Light scanning detected. This is common internet background noise but worth monitoring.",
        _ => return None,
    })
}

fn default_risk_note(severity: i64) -> String {
    match severity {
        1 => "This is a high-severity alert requiring immediate attention. Investigate promptly to prevent potential damage.".to_string(),
        2 => "This is a medium-severity alert. Investigate when possible to determine if action is needed.".to_string(),
        3 => "This is a low-severity alert. Review during routine security monitoring.".to_string(),
        other => format!("Severity {other} alert detected. Review the alert details for more information."),
    }
}

pub fn get_risk_context(severity: i64, category: &str) -> String {
    category_risk_note(category, severity)
        .map(|s| s.to_string())
        .unwrap_or_else(|| default_risk_note(severity))
}

pub fn get_recommendation(category: &str) -> String {
    recommendation_for(category).to_string()
}

fn category_from_signature(signature: &str) -> String {
    if signature.is_empty() {
        return "unknown".to_string();
    }
    let upper = signature.to_uppercase();
    for (prefix, category, _) in PREFIX_PATTERNS {
        if upper.starts_with(&prefix.to_uppercase()) {
            return category.to_string();
        }
    }
    "unknown".to_string()
}

/// Generates a plain-English description from a signature, matching ordered
/// prefix templates; falls back to a generic message if none match.
pub fn generate_description(signature: &str) -> String {
    if signature.is_empty() {
        return "Network security event detected.".to_string();
    }
    let upper = signature.to_uppercase();
    for (prefix, _, template) in PREFIX_PATTERNS {
        let prefix_upper = prefix.to_uppercase();
        if upper.starts_with(&prefix_upper) {
            let mut detail = signature[prefix.len().min(signature.len())..].trim();
            if detail.is_empty() {
                detail = signature;
            }
            return template.replacen("{}", detail, 1);
        }
    }
    format!("Network security event detected: {signature}")
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
struct SidInfo {
    #[serde(default)]
    description: String,
    #[serde(default)]
    risk_context: Option<String>,
    #[serde(default)]
    recommendation: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
struct DescriptionsFile {
    #[serde(default)]
    descriptions: HashMap<String, SidInfo>,
    #[serde(default)]
    #[allow(dead_code)]
    prefix_descriptions: HashMap<String, String>,
}

pub struct AlertEnrichment {
    sid_descriptions: HashMap<String, SidInfo>,
}

impl AlertEnrichment {
    /// Loads the curated SID-to-description mapping; tolerates a missing or
    /// corrupt file by falling back to pure pattern-based generation.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let sid_descriptions = match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<DescriptionsFile>(&contents) {
                Ok(data) => {
                    tracing::info!(
                        "loaded {} SID descriptions from {}",
                        data.descriptions.len(),
                        path.display()
                    );
                    data.descriptions
                }
                Err(e) => {
                    tracing::warn!(
                        "failed to parse suricata descriptions from {}: {e} — using pattern-based fallback",
                        path.display()
                    );
                    HashMap::new()
                }
            },
            Err(_) => {
                tracing::warn!(
                    "suricata descriptions file not found: {} — using pattern-based fallback",
                    path.display()
                );
                HashMap::new()
            }
        };
        Self { sid_descriptions }
    }

    pub fn empty() -> Self {
        Self {
            sid_descriptions: HashMap::new(),
        }
    }

    /// Adds `plain_description`, `risk_context`, and `recommendation` to an
    /// alert's `alert` sub-object, preserving every other field.
    pub fn enrich_alert(&self, alert: &mut serde_json::Value) {
        let signature = alert["alert"]["signature"].as_str().unwrap_or("").to_string();
        let sid = alert["alert"]["signature_id"]
            .as_i64()
            .map(|n| n.to_string())
            .or_else(|| alert["alert"]["signature_id"].as_str().map(|s| s.to_string()));
        let severity = alert["alert"]["severity"].as_i64().unwrap_or(3);
        let category = category_from_signature(&signature);

        if let Some(sid) = sid.as_deref() {
            if let Some(info) = self.sid_descriptions.get(sid) {
                let description = info.description.clone();
                let risk_context = info
                    .risk_context
                    .clone()
                    .unwrap_or_else(|| get_risk_context(severity, &category));
                let recommendation = info
                    .recommendation
                    .clone()
                    .unwrap_or_else(|| get_recommendation(&category));
                alert["plain_description"] = description.into();
                alert["risk_context"] = risk_context.into();
                alert["recommendation"] = recommendation.into();
                return;
            }
        }

        alert["plain_description"] = generate_description(&signature).into();
        alert["risk_context"] = get_risk_context(severity, &category).into();
        alert["recommendation"] = get_recommendation(&category).into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn generates_description_from_known_prefix() {
        let desc = generate_description("ET MALWARE Win32/Emotet");
        assert_eq!(desc, "Potential malware activity detected: Win32/Emotet");
    }

    #[test]
    fn generic_fallback_for_unmatched_prefix() {
        let desc = generate_description("SOMETHING ELSE entirely");
        assert_eq!(desc, "Network security event detected: SOMETHING ELSE entirely");
    }

    #[test]
    fn category_risk_note_overrides_default_for_malware_severity_1() {
        let ctx = get_risk_context(1, "malware");
        assert!(ctx.starts_with("This is a critical threat."));
    }

    #[test]
    fn default_risk_note_for_unmapped_category() {
        let ctx = get_risk_context(2, "policy");
        assert_eq!(
            ctx,
            "This is a medium-severity alert. Investigate when possible to determine if action is needed."
        );
    }

    #[test]
    fn scenario_s6_alert_enrichment_fallback() {
        let enrichment = AlertEnrichment::empty();
        let mut alert = json!({
            "alert": {
                "signature": "ET MALWARE Win32/Unknown",
                "signature_id": 123456,
                "severity": 1
            },
            "src_ip": "10.0.0.5"
        });
        enrichment.enrich_alert(&mut alert);
        assert!(
            alert["plain_description"]
                .as_str()
                .unwrap()
                .starts_with("Potential malware activity detected:")
        );
        assert!(alert["risk_context"].as_str().unwrap().starts_with("This is a critical threat."));
        assert_eq!(
            alert["recommendation"],
            recommendation_for("malware")
        );
        assert_eq!(alert["src_ip"], "10.0.0.5");
    }

    #[test]
    fn sid_lookup_takes_precedence_over_pattern() {
        let mut map = HashMap::new();
        map.insert(
            "999".to_string(),
            SidInfo {
                description: "Curated description".to_string(),
                risk_context: Some("Curated context".to_string()),
                recommendation: Some("Curated recommendation".to_string()),
            },
        );
        let enrichment = AlertEnrichment { sid_descriptions: map };
        let mut alert = json!({"alert": {"signature": "ET SCAN whatever", "signature_id": 999, "severity": 2}});
        enrichment.enrich_alert(&mut alert);
        assert_eq!(alert["plain_description"], "Curated description");
        assert_eq!(alert["risk_context"], "Curated context");
        assert_eq!(alert["recommendation"], "Curated recommendation");
    }
}
