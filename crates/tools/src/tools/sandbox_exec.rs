//! `sandbox_exec`: runs short Python/Bash snippets under resource limits.

use async_trait::async_trait;
use serde_json::{json, Value};
use wre_sandbox::{run_sandbox_exec, SandboxExecArgs};

use crate::context::ToolContext;
use crate::error::ToolError;
use crate::registry::Tool;

#[derive(Default)]
pub struct SandboxExecTool;

#[async_trait]
impl Tool for SandboxExecTool {
    fn name(&self) -> &'static str {
        "sandbox_exec"
    }

    fn description(&self) -> &'static str {
        "Execute a short Python or Bash script in an isolated, resource-limited sandbox and return its output plus any produced files."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "language": {"type": "string", "enum": ["python", "bash"], "default": "python"},
                "code": {"type": "string", "minLength": 1, "maxLength": 100000},
                "stdin": {"type": "string", "maxLength": 100000, "default": ""},
                "timeout_seconds": {"type": "number", "minimum": 0.25, "maximum": 30, "default": 5.0},
                "memory_limit_mb": {"type": "integer", "minimum": 32, "maximum": 1024, "default": 256},
                "max_output_chars": {"type": "integer", "minimum": 200, "maximum": 200000, "default": 20000},
                "files": {"type": "object", "additionalProperties": {"type": "string"}},
            },
            "required": ["code"],
        })
    }

    fn limitations(&self) -> &'static str {
        "No network access; CPU, memory, file-size, open-file, and child-process limits enforced; output truncated."
    }

    async fn run(&self, args: Value, _ctx: &ToolContext) -> Result<Value, ToolError> {
        let args: SandboxExecArgs = serde_json::from_value(args).map_err(|e| ToolError::InvalidArgs {
            tool: self.name().to_string(),
            reason: e.to_string(),
        })?;
        let result = run_sandbox_exec(args).await?;
        Ok(serde_json::to_value(result).unwrap_or(Value::Null))
    }
}
