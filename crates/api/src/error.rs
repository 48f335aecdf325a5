//! Uniform JSON error responses (`spec.md` §7: validation/registry errors
//! map to specific status codes; everything else is a `500`).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// An error surfaced to an HTTP caller. Variants map 1:1 to the status
/// codes `spec.md` §6 documents per endpoint.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not authenticated")]
    Unauthenticated,
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Internal(String),
}

impl From<wre_engine::EngineError> for ApiError {
    fn from(err: wre_engine::EngineError) -> Self {
        match err {
            wre_engine::EngineError::Template(e) => Self::BadRequest(e.to_string()),
            wre_engine::EngineError::Workspace(e) => Self::Internal(e.to_string()),
            wre_engine::EngineError::NotFound(id) => Self::NotFound(format!("run not found: {id}")),
            wre_engine::EngineError::StillActive(id) => {
                Self::Conflict(format!("run {id} is still active and cannot be deleted"))
            }
        }
    }
}

impl From<wre_tools::ToolError> for ApiError {
    fn from(err: wre_tools::ToolError) -> Self {
        match err {
            wre_tools::ToolError::UnknownTool(name) => {
                Self::NotFound(format!("unknown tool '{name}'"))
            }
            wre_tools::ToolError::InvalidArgs { tool, reason } => {
                Self::BadRequest(format!("invalid arguments for '{tool}': {reason}"))
            }
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = if matches!(self, Self::Unauthenticated) {
            "Not authenticated".to_string()
        } else {
            self.to_string()
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
