//! # Workflow Run Engine — tools
//!
//! The sandboxed tool registry (C2): `web_search`, `sandbox_exec`, and the
//! workspace file tools, plus `WorkspaceRef` derivation for successful
//! workspace-touching calls.

pub mod context;
pub mod error;
pub mod registry;
pub mod tools;
pub mod workspace_refs;

pub use context::ToolContext;
pub use error::ToolError;
pub use registry::{Tool, ToolRegistry, ToolRunResult, ToolSpec};
pub use tools::default_registry;
pub use workspace_refs::derive_workspace_refs;
