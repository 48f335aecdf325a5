//! Session lifecycle: `GET /session`, `POST /login`, `POST /logout`
//! (`spec.md` §6). These three are deliberately unauthenticated — they are
//! how a client discovers and changes its own auth state.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::json;

use crate::state::AppState;

pub async fn session(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    Json(json!({ "authenticated": state.session.is_authenticated(&headers) }))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    password: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Response {
    if !state.session.verify_password(&body.password) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Not authenticated" })),
        )
            .into_response();
    }

    let mut response = Json(json!({ "authenticated": true })).into_response();
    response
        .headers_mut()
        .insert(axum::http::header::SET_COOKIE, state.session.issue_cookie());
    response
}

pub async fn logout(State(state): State<AppState>) -> Response {
    let mut response = Json(json!({ "authenticated": false })).into_response();
    response
        .headers_mut()
        .insert(axum::http::header::SET_COOKIE, state.session.clear_cookie());
    response
}
