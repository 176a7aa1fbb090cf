//! Passive device fingerprinting: infers a device's MAC, hostname, and OS
//! hint from recent Zeek telemetry. Every OpenSearch error degrades to
//! absent rather than propagating — these are best-effort lookups.

use std::sync::LazyLock;

use crate::query_builder::{BoolQuery, Query, SearchBody, exists, range_between, term, terms_agg};
use crate::search_client::SearchClient;

/// Ordered regex table for User-Agent -> OS hint; order is significant, the
/// first match wins.
static OS_PATTERNS: LazyLock<Vec<(regex::Regex, &'static str)>> = LazyLock::new(|| {
    let pats: &[(&str, &str)] = &[
        (r"Windows NT 10\.0", "Windows 10/11"),
        (r"Windows NT 6\.3", "Windows 8.1"),
        (r"Windows NT 6\.2", "Windows 8"),
        (r"Windows NT 6\.1", "Windows 7"),
        (r"Windows NT", "Windows"),
        (r"iPhone|iPad|iPod", "iOS"),
        (r"Macintosh|Mac OS X", "macOS"),
        (r"Android", "Android"),
        (r"Linux", "Linux"),
        (r"CrOS", "ChromeOS"),
        (r"PlayStation", "PlayStation"),
        (r"Xbox", "Xbox"),
        (r"Nintendo", "Nintendo"),
        (r"SmartTV|Tizen|webOS", "Smart TV"),
    ];
    pats.iter()
        .map(|(p, label)| (regex::Regex::new(p).unwrap(), *label))
        .collect()
});

fn match_os_hint(user_agent: &str) -> Option<&'static str> {
    OS_PATTERNS
        .iter()
        .find(|(re, _)| re.is_match(user_agent))
        .map(|(_, label)| *label)
}

pub struct Fingerprinter {
    search: SearchClient,
}

impl Fingerprinter {
    pub fn new(search: SearchClient) -> Self {
        Self { search }
    }

    /// MAC: DHCP index by `client_addr`, most recent; fallback to connection
    /// index with `id.orig_h` + `exists(orig_l2_addr)`.
    pub async fn get_mac_for_ip(&self, ip: &str) -> Option<String> {
        let body = SearchBody::new(Query::Bool(
            BoolQuery::new().filter(term("client_addr", ip)),
        ))
        .sort_desc("ts")
        .size(1)
        .source_fields(&["mac"]);

        if let Ok(result) = self.search.search("zeek-dhcp-*", &body).await {
            if let Some(mac) = first_hit_field(&result, "mac") {
                return Some(mac);
            }
        } else {
            tracing::debug!("fingerprint: dhcp mac lookup failed for {ip}");
        }

        let body = SearchBody::new(Query::Bool(
            BoolQuery::new()
                .filter(term("id.orig_h", ip))
                .filter(exists("orig_l2_addr")),
        ))
        .sort_desc("ts")
        .size(1)
        .source_fields(&["orig_l2_addr"]);

        match self.search.search("zeek-conn-*", &body).await {
            Ok(result) => first_hit_field(&result, "orig_l2_addr"),
            Err(_) => {
                tracing::debug!("fingerprint: conn mac fallback failed for {ip}");
                None
            }
        }
    }

    /// Hostname: DNS index aggregated by `query`, filtered on `answers == ip`.
    pub async fn get_hostname_for_ip(&self, ip: &str, from: &str, to: &str) -> Option<String> {
        let body = SearchBody::new(Query::Bool(
            BoolQuery::new()
                .filter(range_between("ts", from, to))
                .filter(term("answers", ip)),
        ))
        .size(0)
        .agg("top_hostname", terms_agg("query", 1));

        match self.search.search("zeek-dns-*", &body).await {
            Ok(result) => result["aggregations"]["top_hostname"]["buckets"]
                .get(0)
                .and_then(|b| b["key"].as_str())
                .map(|s| s.to_string()),
            Err(_) => {
                tracing::debug!("fingerprint: hostname lookup failed for {ip}");
                None
            }
        }
    }

    /// OS hint: top User-Agent from HTTP traffic matched against an ordered
    /// regex table; falls back to a JA3 lookup which currently has no
    /// mapping table and always returns absent.
    pub async fn get_os_hint(&self, ip: &str, from: &str, to: &str) -> Option<&'static str> {
        let body = SearchBody::new(Query::Bool(
            BoolQuery::new()
                .filter(range_between("ts", from, to))
                .filter(term("id.orig_h", ip))
                .filter(exists("user_agent")),
        ))
        .size(0)
        .agg("top_ua", terms_agg("user_agent", 5));

        if let Ok(result) = self.search.search("zeek-http-*", &body).await {
            if let Some(buckets) = result["aggregations"]["top_ua"]["buckets"].as_array() {
                for bucket in buckets {
                    if let Some(ua) = bucket["key"].as_str() {
                        if let Some(hint) = match_os_hint(ua) {
                            return Some(hint);
                        }
                    }
                }
            }
        } else {
            tracing::debug!("fingerprint: os hint http lookup failed for {ip}");
        }

        // JA3 fallback has no lookup table yet; always absent.
        let _ = self.ja3_probe(ip, from, to).await;
        None
    }

    async fn ja3_probe(&self, ip: &str, from: &str, to: &str) {
        let body = SearchBody::new(Query::Bool(
            BoolQuery::new()
                .filter(range_between("ts", from, to))
                .filter(term("id.orig_h", ip))
                .filter(exists("ja3")),
        ))
        .size(0)
        .agg("top_ja3", terms_agg("ja3", 1));

        let _ = self.search.search("zeek-ssl-*", &body).await;
    }
}

fn first_hit_field(result: &serde_json::Value, field: &str) -> Option<String> {
    result["hits"]["hits"]
        .get(0)?
        .get("_source")?
        .get(field)?
        .as_str()
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn os_hint_matches_in_declared_order() {
        assert_eq!(match_os_hint("Mozilla/5.0 (Windows NT 10.0; Win64)"), Some("Windows 10/11"));
        assert_eq!(match_os_hint("Mozilla/5.0 (iPhone; CPU iPhone OS)"), Some("iOS"));
        assert_eq!(match_os_hint("Mozilla/5.0 (Macintosh; Intel Mac OS X)"), Some("macOS"));
        assert_eq!(match_os_hint("Mozilla/5.0 (Linux; Android 13)"), Some("Android"));
        assert_eq!(match_os_hint("Mozilla/5.0 (X11; Linux x86_64)"), Some("Linux"));
        assert_eq!(match_os_hint("SomeBrowser/1.0"), None);
    }
}
