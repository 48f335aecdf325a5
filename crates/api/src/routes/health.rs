//! `GET /health` — unauthenticated liveness probe (`spec.md` §6).

use axum::response::Json;
use serde_json::{json, Value};

pub async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}
