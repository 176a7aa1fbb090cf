use axum::Json;
use axum::extract::State;
use serde_json::json;

use crate::AppState;
use crate::error::ApiError;

/// `GET /api/storage/status`.
pub async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::to_value(state.storage.status().await).unwrap())
}

/// `POST /api/storage/prune` — runs one cycle immediately rather than
/// waiting for the periodic driver; dispatches tiered vs. emergency based on
/// current disk usage, per §4.2's `RunCycle` decision.
pub async fn prune(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let usage = state.storage.check_disk_usage();
    if usage < 0.0 {
        return Err(crate::error::NetTapError::Resource("disk usage unavailable".to_string()).into());
    }
    let deleted = if usage >= state.config.storage.emergency_threshold {
        state.storage.prune_emergency().await
    } else {
        state.storage.prune_tiered().await
    };
    Ok(Json(json!({ "result": "pruned", "deleted": deleted })))
}

/// `GET /api/indices`.
pub async fn list_indices(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::to_value(state.storage.list_indices().await).unwrap())
}
