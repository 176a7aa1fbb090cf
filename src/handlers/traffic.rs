use axum::Json;
use axum::extract::{Query, State};
use serde_json::json;

use crate::AppState;
use crate::enrichment::traffic_classifier;
use crate::error::ApiError;
use crate::handlers::ListQuery;
use crate::models::TimeRange;
use crate::query_builder::{BoolQuery, Query as Q, SearchBody, range_between, terms_agg};

/// `GET /api/traffic/summary` — total connection and byte counts for the range.
pub async fn summary(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let range = TimeRange::parse(params.from.as_deref(), params.to.as_deref());
    let body = SearchBody::new(Q::Bool(
        BoolQuery::new().filter(range_between("ts", &range.from, &range.to)),
    ))
    .size(0)
    .agg("orig_bytes", json!({ "sum": { "field": "orig_bytes" } }))
    .agg("resp_bytes", json!({ "sum": { "field": "resp_bytes" } }));

    let result = state
        .search
        .search("zeek-conn-*", &body)
        .await
        .map_err(|e| crate::error::NetTapError::Downstream(e.to_string()))?;

    let total_connections = result["hits"]["total"]["value"].as_u64().unwrap_or(0);
    let orig_bytes = result["aggregations"]["orig_bytes"]["value"].as_f64().unwrap_or(0.0);
    let resp_bytes = result["aggregations"]["resp_bytes"]["value"].as_f64().unwrap_or(0.0);

    Ok(Json(json!({
        "total_connections": total_connections,
        "orig_bytes": orig_bytes,
        "resp_bytes": resp_bytes,
        "from": range.from,
        "to": range.to,
    })))
}

/// `GET /api/traffic/top-talkers` — top IPs by connection volume.
pub async fn top_talkers(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let range = TimeRange::parse(params.from.as_deref(), params.to.as_deref());
    let limit = params.limit(20, 100);

    let body = SearchBody::new(Q::Bool(
        BoolQuery::new().filter(range_between("ts", &range.from, &range.to)),
    ))
    .size(0)
    .agg("top", terms_agg("id.orig_h", limit));

    let result = state
        .search
        .search("zeek-conn-*", &body)
        .await
        .map_err(|e| crate::error::NetTapError::Downstream(e.to_string()))?;

    let talkers: Vec<serde_json::Value> = result["aggregations"]["top"]["buckets"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .map(|b| json!({ "ip": b["key"], "connection_count": b["doc_count"] }))
        .collect();

    Ok(Json(json!({ "top_talkers": talkers })))
}

/// `GET /api/traffic/categories`.
pub async fn categories(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Json<serde_json::Value> {
    let range = TimeRange::parse(params.from.as_deref(), params.to.as_deref());
    let stats = traffic_classifier::get_category_stats(&state.search, &range.from, &range.to).await;
    Json(json!({ "categories": stats }))
}
