use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Errors surfaced by internal operations that may need to become an HTTP
/// response. Pure-function modules never construct this; it is the boundary
/// type for anything that talks to OpenSearch, the filesystem, or a subprocess.
#[derive(Debug, thiserror::Error)]
pub enum NetTapError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("downstream unavailable: {0}")]
    Downstream(String),
    #[error("subprocess failure: {0}")]
    Subprocess(String),
    #[error("resource failure: {0}")]
    Resource(String),
}

impl From<reqwest::Error> for NetTapError {
    fn from(e: reqwest::Error) -> Self {
        NetTapError::Downstream(e.to_string())
    }
}

impl From<std::io::Error> for NetTapError {
    fn from(e: std::io::Error) -> Self {
        NetTapError::Resource(e.to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// HTTP-facing wrapper implementing the status-code policy from the error
/// handling design: 400 validation, 404 not-found, 502 downstream, 500
/// everything else. Every error body is `{"error": "<message>"}`.
pub struct ApiError(pub NetTapError);

impl From<NetTapError> for ApiError {
    fn from(e: NetTapError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            NetTapError::Validation(m) => (StatusCode::BAD_REQUEST, m.clone()),
            NetTapError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            NetTapError::Downstream(m) => (StatusCode::BAD_GATEWAY, m.clone()),
            NetTapError::Subprocess(m) => (StatusCode::INTERNAL_SERVER_ERROR, m.clone()),
            NetTapError::Resource(m) => (StatusCode::INTERNAL_SERVER_ERROR, m.clone()),
        };
        if status.is_server_error() {
            tracing::error!("{message}");
        }
        (status, axum::Json(ErrorBody { error: message })).into_response()
    }
}

pub type NtResult<T> = Result<T, NetTapError>;
