use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::json;

use crate::AppState;
use crate::error::{ApiError, NetTapError};
use crate::models::{Investigation, InvestigationNote, InvestigationStatus, Severity};

/// `GET /api/investigations`.
pub async fn list(State(state): State<AppState>) -> Json<serde_json::Value> {
    let mut items: Vec<Investigation> = state.investigation_store.all().into_values().collect();
    items.sort_by_key(|i| std::cmp::Reverse(i.created_at));
    Json(json!({ "investigations": items }))
}

/// `GET /api/investigations/{id}`.
pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Investigation>, ApiError> {
    state
        .investigation_store
        .get(&id)
        .map(Json)
        .ok_or_else(|| NetTapError::NotFound(format!("investigation {id} not found")).into())
}

#[derive(Debug, Deserialize)]
pub struct CreateInvestigationBody {
    pub title: String,
    pub description: String,
    #[serde(default = "default_severity")]
    pub severity: Severity,
}

fn default_severity() -> Severity {
    Severity::Low
}

/// `POST /api/investigations`.
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreateInvestigationBody>,
) -> Result<Json<Investigation>, ApiError> {
    if body.title.trim().is_empty() {
        return Err(NetTapError::Validation("title must not be empty".to_string()).into());
    }
    let investigation = Investigation::new(body.title, body.description, body.severity);
    state.investigation_store.set(investigation.id.clone(), investigation.clone());
    Ok(Json(investigation))
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateInvestigationBody {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<InvestigationStatus>,
    pub severity: Option<Severity>,
    pub tags: Option<Vec<String>>,
}

/// `PATCH /api/investigations/{id}`.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateInvestigationBody>,
) -> Result<Json<Investigation>, ApiError> {
    let mut investigation = state
        .investigation_store
        .get(&id)
        .ok_or_else(|| NetTapError::NotFound(format!("investigation {id} not found")))?;

    if let Some(title) = body.title {
        investigation.title = title;
    }
    if let Some(description) = body.description {
        investigation.description = description;
    }
    if let Some(status) = body.status {
        investigation.status = status;
    }
    if let Some(severity) = body.severity {
        investigation.severity = severity;
    }
    if let Some(tags) = body.tags {
        investigation.tags = tags;
    }
    investigation.updated_at = chrono::Utc::now();

    state.investigation_store.set(id, investigation.clone());
    Ok(Json(investigation))
}

/// `DELETE /api/investigations/{id}`.
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .investigation_store
        .remove(&id)
        .map(|_| Json(json!({ "result": "deleted", "id": id })))
        .ok_or_else(|| NetTapError::NotFound(format!("investigation {id} not found")).into())
}

#[derive(Debug, Deserialize)]
pub struct AddNoteBody {
    pub content: String,
}

/// `POST /api/investigations/{id}/notes`.
pub async fn add_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AddNoteBody>,
) -> Result<Json<Investigation>, ApiError> {
    let mut investigation = state
        .investigation_store
        .get(&id)
        .ok_or_else(|| NetTapError::NotFound(format!("investigation {id} not found")))?;

    let now = chrono::Utc::now();
    investigation.notes.push(InvestigationNote {
        id: uuid::Uuid::new_v4().to_string(),
        content: body.content,
        created_at: now,
        updated_at: now,
    });
    investigation.updated_at = now;

    state.investigation_store.set(id, investigation.clone());
    Ok(Json(investigation))
}

#[derive(Debug, Deserialize)]
pub struct LinkBody {
    pub alert_ids: Option<Vec<String>>,
    pub device_ips: Option<Vec<String>>,
}

/// `POST /api/investigations/{id}/links` — appends then dedupes.
pub async fn add_links(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<LinkBody>,
) -> Result<Json<Investigation>, ApiError> {
    let mut investigation = state
        .investigation_store
        .get(&id)
        .ok_or_else(|| NetTapError::NotFound(format!("investigation {id} not found")))?;

    if let Some(alert_ids) = body.alert_ids {
        investigation.alert_ids.extend(alert_ids);
    }
    if let Some(device_ips) = body.device_ips {
        investigation.device_ips.extend(device_ips);
    }
    investigation.dedupe_links();
    investigation.updated_at = chrono::Utc::now();

    state.investigation_store.set(id, investigation.clone());
    Ok(Json(investigation))
}
