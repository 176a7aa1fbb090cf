//! Pure domain/service/port traffic classification, plus an OpenSearch-backed
//! aggregate category breakdown used by traffic summary endpoints.

use std::collections::HashMap;

use crate::query_builder::{BoolQuery, Query, SearchBody, range_between, script_sum_bytes_agg, terms_agg_with_sub};
use crate::search_client::SearchClient;

const CATEGORIES: &[(&str, &str)] = &[
    ("streaming", "Streaming"),
    ("gaming", "Gaming"),
    ("social", "Social Media"),
    ("communication", "Communication"),
    ("work", "Work & Productivity"),
    ("iot", "IoT & Smart Home"),
    ("cloud", "Cloud Services"),
    ("file_transfer", "File Transfer"),
    ("dns", "DNS"),
    ("email", "Email"),
    ("web", "Web Browsing"),
    ("security", "Security & VPN"),
    ("suspicious", "Suspicious"),
    ("other", "Other"),
];

/// Ordered glob patterns, most specific first; `classify_domain` returns the
/// first match.
const DOMAIN_RULES: &[(&str, &str)] = &[
    ("*.netflix.com", "streaming"),
    ("*.nflxvideo.net", "streaming"),
    ("*.youtube.com", "streaming"),
    ("*.googlevideo.com", "streaming"),
    ("*.hulu.com", "streaming"),
    ("*.disneyplus.com", "streaming"),
    ("*.hbomax.com", "streaming"),
    ("*.max.com", "streaming"),
    ("*.plex.tv", "streaming"),
    ("*.plexapp.com", "streaming"),
    ("*.spotify.com", "streaming"),
    ("*.scdn.co", "streaming"),
    ("*.twitch.tv", "streaming"),
    ("*.ttvnw.net", "streaming"),
    ("*.crunchyroll.com", "streaming"),
    ("*.peacocktv.com", "streaming"),
    ("*.paramountplus.com", "streaming"),
    ("*.steampowered.com", "gaming"),
    ("*.steamcontent.com", "gaming"),
    ("*.valvesoftware.com", "gaming"),
    ("*.epicgames.com", "gaming"),
    ("*.unrealengine.com", "gaming"),
    ("*.xboxlive.com", "gaming"),
    ("*.xbox.com", "gaming"),
    ("*.playstation.com", "gaming"),
    ("*.playstation.net", "gaming"),
    ("*.nintendo.com", "gaming"),
    ("*.riotgames.com", "gaming"),
    ("*.blizzard.com", "gaming"),
    ("*.battle.net", "gaming"),
    ("*.ea.com", "gaming"),
    ("*.facebook.com", "social"),
    ("*.fbcdn.net", "social"),
    ("*.instagram.com", "social"),
    ("*.twitter.com", "social"),
    ("*.x.com", "social"),
    ("*.tiktok.com", "social"),
    ("*.tiktokcdn.com", "social"),
    ("*.snapchat.com", "social"),
    ("*.reddit.com", "social"),
    ("*.redditmedia.com", "social"),
    ("*.linkedin.com", "social"),
    ("*.pinterest.com", "social"),
    ("*.zoom.us", "communication"),
    ("*.zoom.com", "communication"),
    ("*.teams.microsoft.com", "communication"),
    ("*.skype.com", "communication"),
    ("*.discord.com", "communication"),
    ("*.discordapp.com", "communication"),
    ("*.slack.com", "communication"),
    ("*.slack-msgs.com", "communication"),
    ("*.webex.com", "communication"),
    ("*.whatsapp.com", "communication"),
    ("*.whatsapp.net", "communication"),
    ("*.signal.org", "communication"),
    ("*.facetime.apple.com", "communication"),
    ("*.github.com", "work"),
    ("*.githubusercontent.com", "work"),
    ("*.gitlab.com", "work"),
    ("*.atlassian.com", "work"),
    ("*.jira.com", "work"),
    ("*.confluence.com", "work"),
    ("*.notion.so", "work"),
    ("*.notion.com", "work"),
    ("*.figma.com", "work"),
    ("*.canva.com", "work"),
    ("*.office.com", "work"),
    ("*.office365.com", "work"),
    ("*.sharepoint.com", "work"),
    ("*.onedrive.com", "work"),
    ("*.docs.google.com", "work"),
    ("*.drive.google.com", "work"),
    ("*.ring.com", "iot"),
    ("*.nest.com", "iot"),
    ("*.home.nest.com", "iot"),
    ("*.wyze.com", "iot"),
    ("*.tp-link.com", "iot"),
    ("*.kasa.com", "iot"),
    ("*.philips-hue.com", "iot"),
    ("*.meethue.com", "iot"),
    ("*.sonos.com", "iot"),
    ("*.ecobee.com", "iot"),
    ("*.smartthings.com", "iot"),
    ("*.tuya.com", "iot"),
    ("*.hubitat.com", "iot"),
    ("*.amazonaws.com", "cloud"),
    ("*.aws.amazon.com", "cloud"),
    ("*.azure.com", "cloud"),
    ("*.azure.net", "cloud"),
    ("*.googleapis.com", "cloud"),
    ("*.gstatic.com", "cloud"),
    ("*.cloudflare.com", "cloud"),
    ("*.cloudflare-dns.com", "cloud"),
    ("*.akamai.com", "cloud"),
    ("*.akamaized.net", "cloud"),
    ("*.fastly.net", "cloud"),
    ("*.dropbox.com", "file_transfer"),
    ("*.wetransfer.com", "file_transfer"),
    ("*.mega.nz", "file_transfer"),
    ("*.box.com", "file_transfer"),
    ("*.nordvpn.com", "security"),
    ("*.expressvpn.com", "security"),
    ("*.wireguard.com", "security"),
    ("*.torproject.org", "security"),
    ("*.protonvpn.com", "security"),
    ("*.protonmail.com", "security"),
    ("*.gmail.com", "email"),
    ("*.outlook.com", "email"),
    ("*.yahoo.com", "email"),
    ("*.mail.com", "email"),
    ("*.onion", "suspicious"),
    ("*.mining.*", "suspicious"),
    ("*.coinhive.com", "suspicious"),
];

const PORT_RULES: &[(u16, &str)] = &[
    (80, "web"),
    (443, "web"),
    (53, "dns"),
    (22, "security"),
    (25, "email"),
    (465, "email"),
    (587, "email"),
    (993, "email"),
    (143, "email"),
    (21, "file_transfer"),
    (3389, "work"),
    (5060, "communication"),
    (5061, "communication"),
];

const SERVICE_RULES: &[(&str, &str)] = &[
    ("http", "web"),
    ("ssl", "web"),
    ("dns", "dns"),
    ("ssh", "security"),
    ("smtp", "email"),
    ("ftp", "file_transfer"),
    ("imap", "email"),
    ("pop3", "email"),
    ("sip", "communication"),
    ("rdp", "work"),
    ("dhcp", "other"),
    ("ntp", "other"),
];

/// Glob matching with `*` wildcards over a single path segment (domain-style).
fn glob_match(pattern: &str, text: &str) -> bool {
    fn inner(p: &[u8], t: &[u8]) -> bool {
        match (p.first(), t.first()) {
            (None, None) => true,
            (Some(b'*'), _) => {
                (0..=t.len()).any(|i| inner(&p[1..], &t[i..]))
            }
            (Some(pc), Some(tc)) if pc == tc => inner(&p[1..], &t[1..]),
            _ => false,
        }
    }
    inner(pattern.as_bytes(), text.as_bytes())
}

pub fn classify_domain(domain: &str) -> &'static str {
    let domain = domain.to_lowercase();
    let domain = domain.trim();
    if domain.is_empty() {
        return "other";
    }
    for (pattern, category) in DOMAIN_RULES {
        if glob_match(&pattern.to_lowercase(), domain) {
            return category;
        }
    }
    "other"
}

pub fn classify_by_service(service: &str) -> &'static str {
    let service = service.to_lowercase();
    let service = service.trim();
    SERVICE_RULES
        .iter()
        .find(|(k, _)| *k == service)
        .map(|(_, v)| *v)
        .unwrap_or("other")
}

pub fn classify_by_port(port: u16) -> &'static str {
    PORT_RULES
        .iter()
        .find(|(p, _)| *p == port)
        .map(|(_, v)| *v)
        .unwrap_or("other")
}

/// Priority order: domain > service > port > "other".
pub fn classify(service: Option<&str>, domain: Option<&str>, port: Option<u16>) -> &'static str {
    if let Some(domain) = domain {
        let cat = classify_domain(domain);
        if cat != "other" {
            return cat;
        }
    }
    if let Some(service) = service {
        let cat = classify_by_service(service);
        if cat != "other" {
            return cat;
        }
    }
    if let Some(port) = port {
        let cat = classify_by_port(port);
        if cat != "other" {
            return cat;
        }
    }
    "other"
}

pub fn category_label(key: &str) -> String {
    CATEGORIES
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| {
            key.split('_')
                .map(|word| {
                    let mut c = word.chars();
                    match c.next() {
                        Some(first) => first.to_uppercase().collect::<String>() + c.as_str(),
                        None => String::new(),
                    }
                })
                .collect::<Vec<_>>()
                .join(" ")
        })
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CategoryDomain {
    pub domain: String,
    pub count: u64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CategoryStat {
    pub name: String,
    pub label: String,
    pub total_bytes: u64,
    pub connection_count: u64,
    pub top_domains: Vec<CategoryDomain>,
}

#[derive(Default)]
struct Accum {
    total_bytes: u64,
    connection_count: u64,
    top_domains: HashMap<String, u64>,
}

/// Two-step aggregation: top DNS domains feed connection counts into their
/// category; per-service byte sums feed total bytes into theirs.
pub async fn get_category_stats(search: &SearchClient, from: &str, to: &str) -> Vec<CategoryStat> {
    let dns_body = SearchBody::new(Query::Bool(
        BoolQuery::new().filter(range_between("ts", from, to)),
    ))
    .size(0)
    .agg(
        "top_domains",
        crate::query_builder::terms_agg("query", 500),
    );

    let dns_result = match search.search("zeek-dns-*", &dns_body).await {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("traffic classifier: dns domain aggregation failed: {e}");
            return Vec::new();
        }
    };

    let conn_body = SearchBody::new(Query::Bool(
        BoolQuery::new().filter(range_between("ts", from, to)),
    ))
    .size(0)
    .agg(
        "by_service",
        terms_agg_with_sub("service", 50, "total_bytes", script_sum_bytes_agg()),
    );

    let conn_result = match search.search("zeek-*", &conn_body).await {
        Ok(r) => r,
        Err(e) => {
            tracing::error!("traffic classifier: connection stats aggregation failed: {e}");
            return Vec::new();
        }
    };

    let mut data: HashMap<String, Accum> = HashMap::new();
    for (key, _) in CATEGORIES {
        data.insert(key.to_string(), Accum::default());
    }

    if let Some(buckets) = dns_result["aggregations"]["top_domains"]["buckets"].as_array() {
        for bucket in buckets {
            let domain = bucket["key"].as_str().unwrap_or("").to_string();
            let count = bucket["doc_count"].as_u64().unwrap_or(0);
            let cat = classify_domain(&domain).to_string();
            let entry = data.entry(cat).or_default();
            entry.connection_count += count;
            *entry.top_domains.entry(domain).or_insert(0) += count;
        }
    }

    if let Some(buckets) = conn_result["aggregations"]["by_service"]["buckets"].as_array() {
        for bucket in buckets {
            let service = bucket["key"].as_str().unwrap_or("");
            let total_bytes = bucket["total_bytes"]["value"].as_u64().unwrap_or(0);
            let cat = classify_by_service(service).to_string();
            data.entry(cat).or_default().total_bytes += total_bytes;
        }
    }

    let mut result: Vec<CategoryStat> = data
        .into_iter()
        .filter(|(_, v)| v.total_bytes != 0 || v.connection_count != 0)
        .map(|(key, v)| {
            let mut domains: Vec<CategoryDomain> = v
                .top_domains
                .into_iter()
                .map(|(domain, count)| CategoryDomain { domain, count })
                .collect();
            domains.sort_by(|a, b| b.count.cmp(&a.count));
            domains.truncate(10);
            CategoryStat {
                label: category_label(&key),
                name: key,
                total_bytes: v.total_bytes,
                connection_count: v.connection_count,
                top_domains: domains,
            }
        })
        .collect();

    result.sort_by(|a, b| b.total_bytes.cmp(&a.total_bytes));
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_domain_by_glob_suffix() {
        assert_eq!(classify_domain("www.netflix.com"), "streaming");
        assert_eq!(classify_domain("ipv4-c001.sjc007.ix.nflxvideo.net"), "streaming");
        assert_eq!(classify_domain("unknown-domain.example"), "other");
    }

    #[test]
    fn classifies_service_and_port() {
        assert_eq!(classify_by_service("DNS"), "dns");
        assert_eq!(classify_by_port(443), "web");
        assert_eq!(classify_by_port(9999), "other");
    }

    #[test]
    fn priority_order_is_domain_then_service_then_port() {
        assert_eq!(classify(Some("ssh"), Some("www.netflix.com"), Some(443)), "streaming");
        assert_eq!(classify(Some("ssh"), None, Some(443)), "security");
        assert_eq!(classify(None, None, Some(443)), "web");
        assert_eq!(classify(None, None, None), "other");
    }

    #[test]
    fn category_label_falls_back_to_title_case() {
        assert_eq!(category_label("streaming"), "Streaming");
        assert_eq!(category_label("file_transfer"), "File Transfer");
        assert_eq!(category_label("made_up_key"), "Made Up Key");
    }
}
