use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use serde_json::json;

use crate::AppState;
use crate::error::{ApiError, NetTapError};
use crate::handlers::ListQuery;
use crate::models::TimeRange;
use crate::query_builder::{BoolQuery, Query as Q, SearchBody, range_between};

const ALERT_INDEX: &str = "suricata-alert-*";

/// `GET /api/alerts` — paginated, enriched with plain-English descriptions
/// and acknowledgement state.
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let range = TimeRange::parse(params.from.as_deref(), params.to.as_deref());
    let size = params.size();
    let offset = (params.page() - 1) * size;

    let body = SearchBody::new(Q::Bool(
        BoolQuery::new().filter(range_between("timestamp", &range.from, &range.to)),
    ))
    .size(size)
    .from_offset(offset)
    .sort_desc("timestamp");

    let result = state
        .search
        .search(ALERT_INDEX, &body)
        .await
        .map_err(|e| NetTapError::Downstream(e.to_string()))?;

    let total = result["hits"]["total"]["value"].as_u64().unwrap_or(0);
    let hits = result["hits"]["hits"].as_array().cloned().unwrap_or_default();
    let acks = state.ack_store.all();

    let alerts: Vec<serde_json::Value> = hits
        .into_iter()
        .map(|hit| {
            let id = hit["_id"].as_str().unwrap_or("").to_string();
            let mut source = hit["_source"].clone();
            state.alert_enrichment.enrich_alert(&mut source);
            if let Some(ack) = acks.get(&id) {
                source["acknowledged"] = json!(ack.acknowledged);
                source["acknowledged_by"] = json!(ack.acknowledged_by);
                source["acknowledged_at"] = json!(ack.acknowledged_at.to_rfc3339());
            } else {
                source["acknowledged"] = json!(false);
            }
            source["id"] = json!(id);
            source
        })
        .collect();

    Ok(Json(json!({ "alerts": alerts, "total": total, "page": params.page(), "size": size })))
}

/// `GET /api/alerts/count`.
pub async fn count(
    State(state): State<AppState>,
    Query(params): Query<RangeParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let range = TimeRange::parse(params.from.as_deref(), params.to.as_deref());
    let body = SearchBody::new(Q::Bool(
        BoolQuery::new().filter(range_between("timestamp", &range.from, &range.to)),
    ))
    .size(0);

    let result = state
        .search
        .search(ALERT_INDEX, &body)
        .await
        .map_err(|e| NetTapError::Downstream(e.to_string()))?;
    let total = result["hits"]["total"]["value"].as_u64().unwrap_or(0);
    Ok(Json(json!({ "count": total })))
}

#[derive(Debug, Deserialize, Default)]
pub struct RangeParams {
    pub from: Option<String>,
    pub to: Option<String>,
}

/// `GET /api/alerts/{id}`.
pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let body = SearchBody::new(Q::Raw(json!({ "ids": { "values": [id.clone()] } }))).size(1);
    let result = state
        .search
        .search(ALERT_INDEX, &body)
        .await
        .map_err(|e| NetTapError::Downstream(e.to_string()))?;

    let hit = result["hits"]["hits"]
        .get(0)
        .ok_or_else(|| NetTapError::NotFound(format!("alert {id} not found")))?;

    let mut source = hit["_source"].clone();
    state.alert_enrichment.enrich_alert(&mut source);
    if let Some(ack) = state.ack_store.get(&id) {
        source["acknowledged"] = json!(ack.acknowledged);
        source["acknowledged_by"] = json!(ack.acknowledged_by);
        source["acknowledged_at"] = json!(ack.acknowledged_at.to_rfc3339());
    } else {
        source["acknowledged"] = json!(false);
    }
    source["id"] = json!(id);
    Ok(Json(source))
}

#[derive(Debug, Deserialize)]
pub struct AcknowledgeBody {
    pub acknowledged_by: String,
}

/// `POST /api/alerts/{id}/acknowledge` — last write wins if called twice.
pub async fn acknowledge(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<AcknowledgeBody>,
) -> Json<serde_json::Value> {
    state.ack_store.acknowledge(&id, &body.acknowledged_by);
    Json(json!({ "result": "acknowledged", "id": id }))
}
