use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;
use serde_json::json;

use crate::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

/// `GET /api/bridge/health` — runs a fresh sampling cycle synchronously.
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::to_value(state.bridge_monitor.check_health().await).unwrap())
}

/// `GET /api/bridge/history`.
pub async fn history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Json<serde_json::Value> {
    let limit = params.limit.unwrap_or(100).min(2880);
    Json(json!({ "history": state.bridge_monitor.history(limit) }))
}

/// `GET /api/bridge/stats`.
pub async fn stats(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::to_value(state.bridge_monitor.statistics()).unwrap())
}

/// `POST /api/bridge/bypass/enable`.
pub async fn bypass_enable(State(state): State<AppState>) -> Json<serde_json::Value> {
    let at = state.bridge_monitor.trigger_bypass();
    Json(json!({ "result": "bypass_enabled", "at": at.to_rfc3339() }))
}

/// `POST /api/bridge/bypass/disable`.
pub async fn bypass_disable(State(state): State<AppState>) -> Json<serde_json::Value> {
    let at = state.bridge_monitor.disable_bypass();
    Json(json!({ "result": "bypass_disabled", "at": at.to_rfc3339() }))
}
