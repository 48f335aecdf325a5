//! The tool registry: enumeration and dispatch (C2).

use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::ToolContext;
use crate::error::ToolError;

/// Metadata describing one registered tool, as returned by `list_tools`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    #[serde(rename = "input_schema")]
    pub input_schema: Value,
    pub limitations: &'static str,
}

/// One dispatchable tool. New tools are addable without touching the
/// agent decision loop (`spec.md` §9 REDESIGN FLAGS).
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn input_schema(&self) -> Value;
    fn limitations(&self) -> &'static str;

    /// # Errors
    /// Returns [`ToolError`] on any failure; never fabricates success.
    async fn run(&self, args: Value, ctx: &ToolContext) -> Result<Value, ToolError>;
}

/// Outcome of a successful `run_tool` call.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ToolRunResult {
    pub tool: String,
    pub ok: bool,
    #[serde(rename = "duration_ms")]
    pub duration_ms: u64,
    pub result: Value,
}

/// Enumerates and dispatches the registered tools.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    #[must_use]
    pub fn new(tools: Vec<Box<dyn Tool>>) -> Self {
        Self { tools }
    }

    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolSpec> {
        self.tools
            .iter()
            .map(|t| ToolSpec {
                name: t.name(),
                description: t.description(),
                input_schema: t.input_schema(),
                limitations: t.limitations(),
            })
            .collect()
    }

    #[must_use]
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name() == name)
    }

    /// Run the named tool. Returns `Err` when the tool is unknown or its
    /// execution fails; callers (C6, the `/tools/run` HTTP handler) turn
    /// that into the appropriate non-fatal representation.
    ///
    /// # Errors
    /// [`ToolError::UnknownTool`] if `name` isn't registered; otherwise
    /// whatever the tool itself raises.
    pub async fn run_tool(
        &self,
        name: &str,
        args: Value,
        ctx: &ToolContext,
    ) -> Result<ToolRunResult, ToolError> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        let start = Instant::now();
        let result = tool.run(args, ctx).await?;
        let duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        Ok(ToolRunResult {
            tool: name.to_string(),
            ok: true,
            duration_ms,
            result,
        })
    }
}
