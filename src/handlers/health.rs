use axum::Json;
use axum::extract::State;
use serde_json::json;

use crate::AppState;
use crate::error::ApiError;

/// `GET /api/health` — process liveness only, no downstream checks.
pub async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// `GET /api/system/health` — composes the OpenSearch, bridge, and internet
/// monitor statuses into one snapshot.
pub async fn system_health(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let opensearch_ok = state.search.info().await.is_ok();
    let bridge = state.bridge_monitor.check_health().await;
    let internet = state.internet_monitor.check_health().await;

    Ok(Json(json!({
        "opensearch": if opensearch_ok { "ok" } else { "unavailable" },
        "bridge": bridge.health_status,
        "internet": internet.status,
    })))
}
