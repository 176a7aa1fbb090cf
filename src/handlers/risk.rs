use axum::Json;
use axum::extract::{Path, Query, State};
use serde_json::json;

use crate::AppState;
use crate::devices;
use crate::error::ApiError;
use crate::handlers::ListQuery;
use crate::models::TimeRange;
use crate::risk_scorer;

/// `GET /api/risk/scores` — up to 500 devices, ranked highest-score-first.
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let range = TimeRange::parse(params.from.as_deref(), params.to.as_deref());
    let limit = params.limit(100, 500);

    let ips = devices::list_device_ips(&state.search, &range.from, &range.to, limit).await;
    let (avg, stddev) = devices::network_connection_stats(&state.search, &range.from, &range.to).await;

    let mut scores = Vec::with_capacity(ips.len());
    for ip in ips {
        let stats = devices::device_stats(&state.search, &ip, &range.from, &range.to, avg, stddev).await;
        let risk = risk_scorer::score(&stats.into_risk_input());
        scores.push(json!({ "ip": ip, "risk": risk }));
    }
    scores.sort_by(|a, b| {
        b["risk"]["score"]
            .as_f64()
            .unwrap_or(0.0)
            .total_cmp(&a["risk"]["score"].as_f64().unwrap_or(0.0))
    });

    Ok(Json(json!({ "scores": scores })))
}

/// `GET /api/risk/scores/{ip}`.
pub async fn get_one(
    State(state): State<AppState>,
    Path(ip): Path<String>,
    Query(params): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let range = TimeRange::parse(params.from.as_deref(), params.to.as_deref());
    let (avg, stddev) = devices::network_connection_stats(&state.search, &range.from, &range.to).await;
    let stats = devices::device_stats(&state.search, &ip, &range.from, &range.to, avg, stddev).await;
    let risk = risk_scorer::score(&stats.into_risk_input());
    Ok(Json(json!({ "ip": ip, "risk": risk })))
}
