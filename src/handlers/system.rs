use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;

use crate::AppState;
use crate::error::{ApiError, NetTapError};
use crate::update_executor::ALREADY_IN_PROGRESS;

/// `GET /api/system/versions`.
pub async fn versions(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::to_value(state.version_manager.get_versions().await).unwrap())
}

/// `GET /api/system/versions/{name}`.
pub async fn get_version(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let component = state
        .version_manager
        .get_component(&name)
        .await
        .ok_or_else(|| NetTapError::NotFound(format!("component {name} not found")))?;
    Ok(Json(serde_json::to_value(component).unwrap()))
}

/// `POST /api/system/versions/scan` — forces an immediate rescan.
pub async fn scan_versions(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::to_value(state.version_manager.scan_versions().await).unwrap())
}

/// `GET /api/system/updates/available`.
pub async fn updates_available(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "updates": state.update_checker.get_available() }))
}

/// `GET /api/system/updates/available/{component}`.
pub async fn update_for(
    State(state): State<AppState>,
    Path(component): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let update = state
        .update_checker
        .get_update_for(&component)
        .ok_or_else(|| NetTapError::NotFound(format!("no update available for {component}")))?;
    Ok(Json(serde_json::to_value(update).unwrap()))
}

/// `POST /api/system/updates/check` — forces an upstream re-check.
pub async fn check_updates(State(state): State<AppState>) -> Json<serde_json::Value> {
    let inventory = state.version_manager.get_versions().await;
    let updates = state.update_checker.check_updates(&inventory.versions).await;
    Json(json!({ "updates": updates }))
}

#[derive(Debug, Deserialize)]
pub struct ApplyUpdateBody {
    pub components: Vec<String>,
}

/// `POST /api/system/updates/apply` — single-flight; a concurrent call
/// returns a 500 with `{"error": "An update is already in progress", "success":
/// false, "total": 0}`, matching §8's scenario S5 shape exactly.
pub async fn apply_updates(State(state): State<AppState>, Json(body): Json<ApplyUpdateBody>) -> Response {
    match state.update_executor.apply_update(body.components).await {
        Ok(batch) => Json(json!({ "result": "applied", "batch": batch })).into_response(),
        Err(e) if e == ALREADY_IN_PROGRESS => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e, "success": false, "total": 0 })),
        )
            .into_response(),
        Err(e) => ApiError::from(NetTapError::Validation(e)).into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct RollbackBody {
    pub component: String,
}

/// `POST /api/system/updates/rollback`.
pub async fn rollback(
    State(state): State<AppState>,
    Json(body): Json<RollbackBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .update_executor
        .rollback(&body.component)
        .await
        .map_err(|e| NetTapError::Validation(e).into())
        .map(|()| Json(json!({ "result": "rolled_back", "component": body.component })))
}
