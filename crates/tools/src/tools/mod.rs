mod sandbox_exec;
mod web_search;
mod workspace_files;

pub use sandbox_exec::SandboxExecTool;
pub use web_search::WebSearchTool;
pub use workspace_files::{
    WorkspaceExecTool, WorkspaceListFilesTool, WorkspaceReadFileTool, WorkspaceWriteFileTool,
};

use crate::registry::{Tool, ToolRegistry};

/// Build the standard registry: the two mandatory tools plus the four
/// workspace tools (`spec.md` §4.2).
#[must_use]
pub fn default_registry() -> ToolRegistry {
    let tools: Vec<Box<dyn Tool>> = vec![
        Box::new(WebSearchTool::default()),
        Box::new(SandboxExecTool),
        Box::new(WorkspaceListFilesTool),
        Box::new(WorkspaceReadFileTool),
        Box::new(WorkspaceWriteFileTool),
        Box::new(WorkspaceExecTool),
    ];
    ToolRegistry::new(tools)
}
