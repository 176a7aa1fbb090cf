//! Per-IP device statistics derived from Zeek connection and Suricata alert
//! telemetry. Feeds both the devices endpoints and the risk scorer (C5),
//! which takes a `RiskInput` built from this module's output.

use serde::Serialize;
use serde_json::json;

use crate::query_builder::{BoolQuery, Query, SearchBody, range_between, term, terms_agg};
use crate::search_client::SearchClient;

#[derive(Debug, Clone, Serialize)]
pub struct DeviceStats {
    pub ip: String,
    pub alert_count: u64,
    pub connection_count: f64,
    pub network_avg_connections: f64,
    pub network_stddev_connections: f64,
    pub external_connection_count: f64,
    pub total_connection_count: f64,
    pub ports_used: Vec<u16>,
    pub orig_bytes: f64,
    pub resp_bytes: f64,
}

/// Top-N device IPs by connection volume over the range, for list endpoints.
pub async fn list_device_ips(search: &SearchClient, from: &str, to: &str, limit: u32) -> Vec<String> {
    let body = SearchBody::new(Query::Bool(
        BoolQuery::new().filter(range_between("ts", from, to)),
    ))
    .size(0)
    .agg("by_ip", terms_agg("id.orig_h", limit));

    match search.search("zeek-conn-*", &body).await {
        Ok(result) => result["aggregations"]["by_ip"]["buckets"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|b| b["key"].as_str().map(|s| s.to_string()))
            .collect(),
        Err(e) => {
            tracing::warn!("devices: list_device_ips failed: {e}");
            Vec::new()
        }
    }
}

/// Network-wide average/stddev of per-device connection counts, used as the
/// risk scorer's anomaly baseline.
pub async fn network_connection_stats(search: &SearchClient, from: &str, to: &str) -> (f64, f64) {
    let body = SearchBody::new(Query::Bool(
        BoolQuery::new().filter(range_between("ts", from, to)),
    ))
    .size(0)
    .agg("by_ip", terms_agg("id.orig_h", 1000));

    let counts: Vec<f64> = match search.search("zeek-conn-*", &body).await {
        Ok(result) => result["aggregations"]["by_ip"]["buckets"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|b| b["doc_count"].as_f64())
            .collect(),
        Err(e) => {
            tracing::warn!("devices: network_connection_stats failed: {e}");
            Vec::new()
        }
    };

    if counts.is_empty() {
        return (0.0, 0.0);
    }
    let avg = counts.iter().sum::<f64>() / counts.len() as f64;
    let variance = counts.iter().map(|c| (c - avg).powi(2)).sum::<f64>() / counts.len() as f64;
    (avg, variance.sqrt())
}

pub async fn device_stats(
    search: &SearchClient,
    ip: &str,
    from: &str,
    to: &str,
    network_avg: f64,
    network_stddev: f64,
) -> DeviceStats {
    let conn_filter = || {
        BoolQuery::new()
            .filter(range_between("ts", from, to))
            .filter(term("id.orig_h", ip))
    };

    let total_body = SearchBody::new(Query::Bool(conn_filter()))
        .size(0)
        .agg("ports", terms_agg("id.resp_p", 50))
        .agg("orig_bytes", json!({ "sum": { "field": "orig_bytes" } }))
        .agg("resp_bytes", json!({ "sum": { "field": "resp_bytes" } }));

    let (total_connection_count, ports_used, orig_bytes, resp_bytes) =
        match search.search("zeek-conn-*", &total_body).await {
            Ok(result) => {
                let total = result["hits"]["total"]["value"].as_f64().unwrap_or(0.0);
                let ports = result["aggregations"]["ports"]["buckets"]
                    .as_array()
                    .into_iter()
                    .flatten()
                    .filter_map(|b| b["key"].as_u64())
                    .map(|p| p as u16)
                    .collect();
                let orig = result["aggregations"]["orig_bytes"]["value"].as_f64().unwrap_or(0.0);
                let resp = result["aggregations"]["resp_bytes"]["value"].as_f64().unwrap_or(0.0);
                (total, ports, orig, resp)
            }
            Err(e) => {
                tracing::warn!("devices: device_stats connection query failed for {ip}: {e}");
                (0.0, Vec::new(), 0.0, 0.0)
            }
        };

    let external_body = SearchBody::new(Query::Bool(
        conn_filter().filter(term("local_resp", false)),
    ))
    .size(0);
    let external_connection_count = match search.search("zeek-conn-*", &external_body).await {
        Ok(result) => result["hits"]["total"]["value"].as_f64().unwrap_or(0.0),
        Err(_) => 0.0,
    };

    let alert_body = SearchBody::new(Query::Bool(
        BoolQuery::new()
            .filter(range_between("timestamp", from, to))
            .should(term("src_ip", ip))
            .should(term("dest_ip", ip))
            .minimum_should_match(1),
    ))
    .size(0);
    let alert_count = match search.search("suricata-alert-*", &alert_body).await {
        Ok(result) => result["hits"]["total"]["value"].as_u64().unwrap_or(0),
        Err(e) => {
            tracing::warn!("devices: alert_count query failed for {ip}: {e}");
            0
        }
    };

    DeviceStats {
        ip: ip.to_string(),
        alert_count,
        connection_count: total_connection_count,
        network_avg_connections: network_avg,
        network_stddev_connections: network_stddev,
        external_connection_count,
        total_connection_count,
        ports_used,
        orig_bytes,
        resp_bytes,
    }
}

impl DeviceStats {
    pub fn into_risk_input(&self) -> crate::risk_scorer::RiskInput {
        crate::risk_scorer::RiskInput {
            alert_count: self.alert_count,
            connection_count: self.connection_count,
            network_avg: self.network_avg_connections,
            network_stddev: self.network_stddev_connections,
            external: self.external_connection_count,
            total: self.total_connection_count,
            ports: self.ports_used.clone(),
            orig_bytes: self.orig_bytes,
            resp_bytes: self.resp_bytes,
        }
    }
}
