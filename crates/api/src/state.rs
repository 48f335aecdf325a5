//! Shared `axum` state: the run registry, the tool registry, session auth,
//! and the runs-root used to materialize ad-hoc tool contexts.

use std::path::PathBuf;
use std::sync::Arc;

use wre_core::RunId;
use wre_engine::Registry;
use wre_tools::{ToolContext, ToolRegistry};
use wre_workspace::RunWorkspace;

use crate::auth::SessionAuth;

/// Cloned into every handler via `axum::extract::State`; everything inside
/// is already `Arc`/`Clone`-cheap.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub tool_registry: Arc<ToolRegistry>,
    pub session: SessionAuth,
    pub cors_origins: Vec<String>,
    runs_root: PathBuf,
}

impl AppState {
    #[must_use]
    pub fn new(
        registry: Arc<Registry>,
        tool_registry: Arc<ToolRegistry>,
        session: SessionAuth,
        cors_origins: Vec<String>,
        runs_root: PathBuf,
    ) -> Self {
        Self {
            registry,
            tool_registry,
            session,
            cors_origins,
            runs_root,
        }
    }

    /// `POST /tools/run` calls a tool outside any workflow run. It still
    /// needs a [`ToolContext`] rooted somewhere on disk for the workspace
    /// file tools, so one ephemeral per-call workspace is created under
    /// `<runs-root>/_adhoc_tools/<random-id>/` and reused for every
    /// workspace-touching call this request makes.
    pub fn adhoc_tool_context(&self) -> Result<ToolContext, wre_workspace::WorkspaceError> {
        let adhoc_root = self.runs_root.join("_adhoc_tools");
        let workspace = RunWorkspace::create(&adhoc_root, &RunId::generate().to_string())?;
        Ok(ToolContext::new(workspace))
    }
}
