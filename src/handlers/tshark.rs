use axum::Json;
use axum::extract::{Path, State};
use serde::Deserialize;
use serde_json::json;

use crate::AppState;
use crate::error::ApiError;
use crate::tshark::TSharkRequest;

#[derive(Debug, Deserialize)]
pub struct AnalyzeBody {
    pub pcap_path: String,
    #[serde(default)]
    pub display_filter: String,
    #[serde(default = "default_max_packets")]
    pub max_packets: u32,
    #[serde(default = "default_output_format")]
    pub output_format: String,
    #[serde(default)]
    pub fields: Vec<String>,
}

fn default_max_packets() -> u32 {
    1000
}

fn default_output_format() -> String {
    "json".to_string()
}

/// `POST /api/tshark/analyze`.
pub async fn analyze(
    State(state): State<AppState>,
    Json(body): Json<AnalyzeBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request = TSharkRequest {
        pcap_path: body.pcap_path,
        display_filter: body.display_filter,
        max_packets: body.max_packets,
        output_format: body.output_format,
        fields: body.fields,
    };
    let result = state.tshark.analyze(request).await?;
    Ok(Json(serde_json::to_value(result).unwrap()))
}

/// `GET /api/tshark/version`.
pub async fn version(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "version": state.tshark.get_version().await }))
}

/// `GET /api/tshark/available`.
pub async fn available(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "available": state.tshark.is_available().await }))
}

#[derive(Debug, Deserialize)]
pub struct FilterValidationBody {
    pub display_filter: String,
}

/// `POST /api/tshark/validate-filter` — dry-run validation, doesn't parse any capture.
pub async fn validate_filter(
    State(state): State<AppState>,
    Json(body): Json<FilterValidationBody>,
) -> Json<serde_json::Value> {
    let valid = state.tshark.validate_filter_dry_run(&body.display_filter).await;
    Json(json!({ "valid": valid }))
}

/// `GET /api/tshark/protocols`.
pub async fn protocols(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({ "protocols": state.tshark.list_protocols().await }))
}

/// `GET /api/tshark/fields/{protocol}`.
pub async fn fields(
    State(state): State<AppState>,
    Path(protocol): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let fields = state.tshark.list_fields(&protocol).await?;
    Ok(Json(json!({ "fields": fields })))
}
