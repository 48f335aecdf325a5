//! `/workflow-runs*` — the run lifecycle endpoints (`spec.md` §6, C7/C8).

use std::convert::Infallible;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event as SseEvent, KeepAlive, Sse};
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use wre_core::RunId;
use wre_eventlog::StreamEvent;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    50
}

pub async fn list_runs(State(state): State<AppState>, Query(q): Query<ListQuery>) -> impl IntoResponse {
    Json(json!({ "runs": state.registry.list(q.limit) }))
}

pub async fn create_run(
    State(state): State<AppState>,
    Json(request): Json<wre_engine::RunCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let view = state.registry.create(request)?;
    Ok(Json(view))
}

pub async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let run_id = RunId::from_raw(run_id);
    state
        .registry
        .get(&run_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("run not found: {}", run_id.as_str())))
}

pub async fn cancel_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let run_id = RunId::from_raw(run_id);
    state
        .registry
        .cancel(&run_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("run not found: {}", run_id.as_str())))
}

pub async fn delete_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let run_id = RunId::from_raw(run_id);
    let run = state.registry.delete(&run_id)?;
    Ok(Json(json!({ "deleted": true, "run": run })))
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    #[serde(default = "default_last_seq", rename = "lastSeq")]
    last_seq: i64,
}

fn default_last_seq() -> i64 {
    -1
}

/// `GET /workflow-runs/{id}/events` — `spec.md` §4.5/§6 SSE stream.
///
/// Unlike the polling loop `spec.md` §4.5 sketches as a correctness floor,
/// this pushes from the run's broadcast channel (`spec.md` §9 REDESIGN
/// FLAGS: "prefer a push model"), replaying everything since `lastSeq`
/// before switching to live events.
pub async fn run_events(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
    Query(q): Query<EventsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let run_id = RunId::from_raw(run_id);
    let Some((replay, live, terminal)) = state.registry.stream(&run_id, q.last_seq) else {
        return Err(ApiError::NotFound(format!(
            "run not found: {}",
            run_id.as_str()
        )));
    };

    let stream = async_stream::stream! {
        for event in replay {
            yield Ok::<_, Infallible>(to_sse_event(&event));
        }
        if terminal {
            return;
        }

        let mut live = live;
        loop {
            match live.recv().await {
                Ok(event) => {
                    let is_complete = matches!(event, StreamEvent::RunComplete);
                    yield Ok(to_sse_event(&event));
                    if is_complete {
                        break;
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn to_sse_event(event: &StreamEvent) -> SseEvent {
    SseEvent::default().event(event.event_name()).data(event.data_json())
}
