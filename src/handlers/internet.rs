use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;
use serde_json::json;

use crate::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

/// `GET /api/internet/health` — runs a fresh probe cycle synchronously.
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::to_value(state.internet_monitor.check_health().await).unwrap())
}

/// `GET /api/internet/history`.
pub async fn history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Json<serde_json::Value> {
    let limit = params.limit.unwrap_or(100).min(2880);
    Json(json!({ "history": state.internet_monitor.history(limit) }))
}

/// `GET /api/internet/stats`.
pub async fn stats(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::to_value(state.internet_monitor.statistics()).unwrap())
}
