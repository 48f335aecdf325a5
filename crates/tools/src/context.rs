//! Ambient context threaded into every tool invocation.

use wre_workspace::RunWorkspace;

/// Per-run context a tool executes under: currently just the workspace
/// root.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub workspace: RunWorkspace,
}

impl ToolContext {
    #[must_use]
    pub fn new(workspace: RunWorkspace) -> Self {
        Self { workspace }
    }
}
