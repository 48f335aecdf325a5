//! Binary wiring for the Workflow Run Engine HTTP server: parses config,
//! initializes tracing, builds the registry and decision client, and
//! serves `wre_api::build_router` until a shutdown signal arrives.

mod config;

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use wre_agent::{AgentDecisionClient, MissingApiKeyClient, OpenAiChatDecisionClient};
use wre_api::{AppState, SessionAuth};
use wre_engine::{Registry, SchedulerDeps};

use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();
    init_tracing();

    let decision_client: Arc<dyn AgentDecisionClient> = match &config.openai_api_key {
        Some(key) if !key.is_empty() => {
            Arc::new(OpenAiChatDecisionClient::new(key.clone(), config.model()))
        }
        _ => {
            tracing::warn!("OPENAI_API_KEY is unset; node decision loops will fail on first use");
            Arc::new(MissingApiKeyClient)
        }
    };

    let runs_root = config.runs_root();
    std::fs::create_dir_all(&runs_root)?;

    let registry = Arc::new(Registry::new(SchedulerDeps {
        tool_registry: Arc::new(wre_tools::default_registry()),
        decision_client,
        max_turns: config.max_turns(),
        runs_root: runs_root.clone(),
    }));

    let session = SessionAuth::new(
        config.app_password.clone(),
        config.session_secret(),
        config.cookie_secure,
    );

    let state = AppState::new(
        registry,
        Arc::new(wre_tools::default_registry()),
        session,
        config.cors_origins(),
        runs_root,
    );

    let router = wre_api::build_router(state, &config.api_prefix);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, prefix = %config.api_prefix, "workflow run engine listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    tracing::info!("shutdown signal received");
}
