//! `GET /tools`, `POST /tools/run` (`spec.md` §6, C2).

use axum::extract::State;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

pub async fn list_tools(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "tools": state.tool_registry.list_tools() }))
}

#[derive(Debug, Deserialize)]
pub struct RunToolRequest {
    tool: String,
    #[serde(default)]
    args: Value,
}

pub async fn run_tool(
    State(state): State<AppState>,
    Json(body): Json<RunToolRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.tool_registry.has_tool(&body.tool) {
        return Err(ApiError::NotFound(format!("unknown tool '{}'", body.tool)));
    }

    let ctx = state
        .adhoc_tool_context()
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let result = state
        .tool_registry
        .run_tool(&body.tool, body.args, &ctx)
        .await?;

    Ok(Json(json!({
        "tool": result.tool,
        "ok": result.ok,
        "duration_ms": result.duration_ms,
        "result": result.result,
    })))
}
