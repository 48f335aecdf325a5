use thiserror::Error;

/// A tool execution failure. `spec.md` §4.2/§7: these are surfaced to C6 as
/// exceptions captured into the turn history, never fabricated as success.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool '{0}'")]
    UnknownTool(String),
    #[error("invalid arguments for '{tool}': {reason}")]
    InvalidArgs { tool: String, reason: String },
    #[error(transparent)]
    Workspace(#[from] wre_workspace::WorkspaceError),
    #[error(transparent)]
    Sandbox(#[from] wre_sandbox::SandboxError),
    #[error("network request failed: {0}")]
    Network(String),
    #[error("failed to parse provider response: {0}")]
    ParseFailure(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
