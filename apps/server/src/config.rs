//! Server configuration, read once at startup from the environment
//! variables `spec.md` §6 documents, via `clap`'s `env` attribute.

use clap::Parser;

/// Default model id when neither `WORKFLOW_RUN_MODEL` nor
/// `WORKFLOW_MODEL` is set.
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default bind address for the HTTP listener.
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8787";

#[derive(Debug, Clone, Parser)]
#[command(name = "wre-server", about = "Workflow Run Engine HTTP server")]
pub struct ServerConfig {
    /// Address to bind the HTTP listener on.
    #[arg(long, env = "WRE_BIND_ADDR", default_value = DEFAULT_BIND_ADDR)]
    pub bind_addr: String,

    /// Mount prefix for the HTTP surface (`spec.md` §6).
    #[arg(long, env = "WRE_API_PREFIX", default_value = "/api")]
    pub api_prefix: String,

    /// Credential for the injected `AgentDecisionClient`.
    #[arg(long, env = "OPENAI_API_KEY")]
    pub openai_api_key: Option<String>,

    /// Preferred model id; falls back to `WORKFLOW_MODEL`, then
    /// [`DEFAULT_MODEL`].
    #[arg(long, env = "WORKFLOW_RUN_MODEL")]
    pub workflow_run_model: Option<String>,

    #[arg(long, env = "WORKFLOW_MODEL")]
    pub workflow_model: Option<String>,

    /// Per-node decision-loop turn budget, clamped to `[1, 100]`.
    #[arg(long, env = "WORKFLOW_NODE_MAX_STEPS", default_value_t = 100)]
    pub workflow_node_max_steps: u32,

    /// Runs root directory; defaults to
    /// `<cwd>/.ninth-seat-artifacts/workflow-runs`.
    #[arg(long, env = "WORKFLOW_RUN_ARTIFACTS_DIR")]
    pub workflow_run_artifacts_dir: Option<String>,

    /// Session login password. Unset means dev-mode (open access).
    #[arg(long, env = "APP_PASSWORD")]
    pub app_password: Option<String>,

    /// HMAC key signing session cookies.
    #[arg(long, env = "SESSION_SECRET")]
    pub session_secret: Option<String>,

    /// Comma-separated list of allowed CORS origins; empty means "allow
    /// any origin".
    #[arg(long, env = "FRONTEND_ORIGINS", default_value = "")]
    pub frontend_origins: String,

    /// Whether to mark the session cookie `Secure`.
    #[arg(long, env = "COOKIE_SECURE", default_value_t = false)]
    pub cookie_secure: bool,
}

impl ServerConfig {
    /// Model id to pass to the decision client: `WORKFLOW_RUN_MODEL`, then
    /// `WORKFLOW_MODEL`, then [`DEFAULT_MODEL`].
    #[must_use]
    pub fn model(&self) -> String {
        self.workflow_run_model
            .clone()
            .or_else(|| self.workflow_model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }

    #[must_use]
    pub fn max_turns(&self) -> u32 {
        self.workflow_node_max_steps.clamp(1, 100)
    }

    #[must_use]
    pub fn runs_root(&self) -> std::path::PathBuf {
        self.workflow_run_artifacts_dir
            .clone()
            .map_or_else(|| std::path::PathBuf::from(wre_workspace::DEFAULT_RUNS_ROOT), std::path::PathBuf::from)
    }

    #[must_use]
    pub fn cors_origins(&self) -> Vec<String> {
        self.frontend_origins
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Session secret to sign cookies with. Falls back to a fixed dev
    /// value when `SESSION_SECRET` is unset and `APP_PASSWORD` is also
    /// unset (open-access dev mode); requires an explicit secret otherwise.
    #[must_use]
    pub fn session_secret(&self) -> String {
        self.session_secret
            .clone()
            .unwrap_or_else(|| "wre-dev-session-secret-change-me".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> ServerConfig {
        ServerConfig {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            api_prefix: "/api".to_string(),
            openai_api_key: None,
            workflow_run_model: None,
            workflow_model: None,
            workflow_node_max_steps: 100,
            workflow_run_artifacts_dir: None,
            app_password: None,
            session_secret: None,
            frontend_origins: String::new(),
            cookie_secure: false,
        }
    }

    #[test]
    fn model_prefers_run_model_over_model_over_default() {
        let mut cfg = base_config();
        assert_eq!(cfg.model(), "gpt-4o-mini");
        cfg.workflow_model = Some("gpt-4o".to_string());
        assert_eq!(cfg.model(), "gpt-4o");
        cfg.workflow_run_model = Some("gpt-5".to_string());
        assert_eq!(cfg.model(), "gpt-5");
    }

    #[test]
    fn max_turns_is_clamped() {
        let mut cfg = base_config();
        cfg.workflow_node_max_steps = 0;
        assert_eq!(cfg.max_turns(), 1);
        cfg.workflow_node_max_steps = 500;
        assert_eq!(cfg.max_turns(), 100);
    }

    #[test]
    fn cors_origins_splits_and_trims() {
        let mut cfg = base_config();
        cfg.frontend_origins = " https://a.example, https://b.example ,,".to_string();
        assert_eq!(
            cfg.cors_origins(),
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }
}
