use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::json;

use crate::AppState;
use crate::error::{ApiError, NetTapError};
use crate::models::{ReportFormat, ReportFrequency, ReportSchedule, ReportSection};

/// `GET /api/schedules`.
pub async fn list(State(state): State<AppState>) -> Json<serde_json::Value> {
    let items: Vec<ReportSchedule> = state.schedule_store.all().into_values().collect();
    Json(json!({ "schedules": items }))
}

/// `GET /api/schedules/{id}`.
pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ReportSchedule>, ApiError> {
    state
        .schedule_store
        .get(&id)
        .map(Json)
        .ok_or_else(|| NetTapError::NotFound(format!("schedule {id} not found")).into())
}

#[derive(Debug, Deserialize)]
pub struct CreateScheduleBody {
    pub name: String,
    pub frequency: ReportFrequency,
    pub format: ReportFormat,
    pub sections: Vec<ReportSection>,
    #[serde(default)]
    pub recipients: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// `POST /api/schedules`.
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreateScheduleBody>,
) -> Result<Json<ReportSchedule>, ApiError> {
    let schedule = ReportSchedule::new(
        body.name,
        body.frequency,
        body.format,
        body.sections,
        body.recipients,
        body.enabled,
    )
    .map_err(NetTapError::Validation)?;
    state.schedule_store.set(schedule.id.clone(), schedule.clone());
    Ok(Json(schedule))
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateScheduleBody {
    pub name: Option<String>,
    pub recipients: Option<Vec<String>>,
    pub enabled: Option<bool>,
    pub sections: Option<Vec<ReportSection>>,
}

/// `PATCH /api/schedules/{id}`.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateScheduleBody>,
) -> Result<Json<ReportSchedule>, ApiError> {
    let mut schedule = state
        .schedule_store
        .get(&id)
        .ok_or_else(|| NetTapError::NotFound(format!("schedule {id} not found")))?;

    if let Some(name) = body.name {
        schedule.name = name;
    }
    if let Some(recipients) = body.recipients {
        schedule.recipients = recipients;
    }
    if let Some(sections) = body.sections {
        if sections.is_empty() {
            return Err(NetTapError::Validation("sections must be non-empty".to_string()).into());
        }
        schedule.sections = sections;
    }
    if let Some(enabled) = body.enabled {
        schedule.enabled = enabled;
    }

    state.schedule_store.set(id, schedule.clone());
    Ok(Json(schedule))
}

/// `DELETE /api/schedules/{id}`.
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .schedule_store
        .remove(&id)
        .map(|_| Json(json!({ "result": "deleted", "id": id })))
        .ok_or_else(|| NetTapError::NotFound(format!("schedule {id} not found")).into())
}
