use axum::Json;
use axum::extract::{Path, Query, State};
use serde_json::json;

use crate::AppState;
use crate::devices;
use crate::error::ApiError;
use crate::handlers::ListQuery;
use crate::models::TimeRange;
use crate::query_builder::{BoolQuery, Query as Q, SearchBody, range_between, term};

/// `GET /api/devices` — up to 500 devices, enriched with manufacturer and
/// hostname.
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let range = TimeRange::parse(params.from.as_deref(), params.to.as_deref());
    let limit = params.limit(100, 500);

    let ips = devices::list_device_ips(&state.search, &range.from, &range.to, limit).await;
    let (avg, stddev) = devices::network_connection_stats(&state.search, &range.from, &range.to).await;

    let mut out = Vec::with_capacity(ips.len());
    for ip in ips {
        let stats = devices::device_stats(&state.search, &ip, &range.from, &range.to, avg, stddev).await;
        let mac = state.fingerprinter.get_mac_for_ip(&ip).await;
        let manufacturer = mac.as_deref().map(|m| state.oui.lookup(m));
        let hostname = state.fingerprinter.get_hostname_for_ip(&ip, &range.from, &range.to).await;
        out.push(json!({
            "ip": stats.ip,
            "mac": mac,
            "manufacturer": manufacturer,
            "hostname": hostname,
            "stats": stats,
        }));
    }
    Ok(Json(json!({ "devices": out })))
}

/// `GET /api/devices/{ip}`.
pub async fn get_one(
    State(state): State<AppState>,
    Path(ip): Path<String>,
    Query(params): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let range = TimeRange::parse(params.from.as_deref(), params.to.as_deref());
    let (avg, stddev) = devices::network_connection_stats(&state.search, &range.from, &range.to).await;
    let stats = devices::device_stats(&state.search, &ip, &range.from, &range.to, avg, stddev).await;
    let mac = state.fingerprinter.get_mac_for_ip(&ip).await;
    let manufacturer = mac.as_deref().map(|m| state.oui.lookup(m));
    let hostname = state.fingerprinter.get_hostname_for_ip(&ip, &range.from, &range.to).await;
    let os_hint = state.fingerprinter.get_os_hint(&ip, &range.from, &range.to).await;

    Ok(Json(json!({
        "ip": stats.ip,
        "mac": mac,
        "manufacturer": manufacturer,
        "hostname": hostname,
        "os_hint": os_hint,
        "stats": stats,
    })))
}

/// `GET /api/devices/{ip}/connections`.
pub async fn connections(
    State(state): State<AppState>,
    Path(ip): Path<String>,
    Query(params): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let range = TimeRange::parse(params.from.as_deref(), params.to.as_deref());
    let size = params.limit(100, 500);

    let body = SearchBody::new(Q::Bool(
        BoolQuery::new()
            .filter(range_between("ts", &range.from, &range.to))
            .filter(term("id.orig_h", ip.as_str())),
    ))
    .size(size)
    .sort_desc("ts");

    let result = state
        .search
        .search("zeek-conn-*", &body)
        .await
        .map_err(|e| crate::error::NetTapError::Downstream(e.to_string()))?;

    let hits: Vec<serde_json::Value> = result["hits"]["hits"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .map(|h| h["_source"].clone())
        .collect();

    Ok(Json(json!({ "ip": ip, "connections": hits })))
}
