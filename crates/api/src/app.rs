//! Router assembly: mounts every `spec.md` §6 endpoint under a configurable
//! prefix (default `/api`) and layers CORS + request tracing the way the
//! teacher's `gateway` binary composes its router.

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::require_session;
use crate::routes::{health, session, tools, workflow_runs};
use crate::state::AppState;

/// Build the full router for `state`, mounted at `prefix` (`spec.md` §6:
/// "Prefix mount is configurable (default `/api`)").
#[must_use]
pub fn build_router(state: AppState, prefix: &str) -> Router {
    let protected = Router::new()
        .route("/tools", get(tools::list_tools))
        .route("/tools/run", post(tools::run_tool))
        .route("/workflow-runs", get(workflow_runs::list_runs).post(workflow_runs::create_run))
        .route("/workflow-runs/{id}", get(workflow_runs::get_run).delete(workflow_runs::delete_run))
        .route("/workflow-runs/{id}/cancel", post(workflow_runs::cancel_run))
        .route("/workflow-runs/{id}/events", get(workflow_runs::run_events))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    let public = Router::new()
        .route("/health", get(health::health))
        .route("/session", get(session::session))
        .route("/login", post(session::login))
        .route("/logout", post(session::logout));

    let api = Router::new().merge(public).merge(protected);

    Router::new()
        .nest(prefix, api)
        .layer(cors_layer(&state.cors_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::any()
    } else {
        let parsed: Vec<_> = origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SessionAuth;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state(tmp: &std::path::Path) -> AppState {
        struct NoopClient;
        #[async_trait::async_trait]
        impl wre_agent::AgentDecisionClient for NoopClient {
            async fn decide(
                &self,
                _system_prompt: &str,
                _user_text: &str,
                _schema_text: &str,
                _cancellation: &tokio_util::sync::CancellationToken,
            ) -> Result<String, wre_agent::AgentError> {
                Ok(serde_json::json!({"action": "final", "summary": "done"}).to_string())
            }
        }

        let registry = Arc::new(wre_engine::Registry::new(wre_engine::SchedulerDeps {
            tool_registry: Arc::new(wre_tools::default_registry()),
            decision_client: Arc::new(NoopClient),
            max_turns: 5,
            runs_root: tmp.to_path_buf(),
        }));
        AppState::new(
            registry,
            Arc::new(wre_tools::default_registry()),
            SessionAuth::open(),
            vec![],
            tmp.to_path_buf(),
        )
    }

    #[tokio::test]
    async fn health_is_unauthenticated_and_ok() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(test_state(tmp.path()), "/api");
        let response = app
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn tools_requires_auth_when_password_configured() {
        let tmp = tempfile::tempdir().unwrap();
        let mut state = test_state(tmp.path());
        state.session = SessionAuth::new(Some("secret".to_string()), "hmac-key".to_string(), false);
        let app = build_router(state, "/api");
        let response = app
            .oneshot(Request::builder().uri("/api/tools").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_run_returns_404() {
        let tmp = tempfile::tempdir().unwrap();
        let app = build_router(test_state(tmp.path()), "/api");
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/workflow-runs/wfr_missing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
