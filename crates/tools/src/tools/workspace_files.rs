//! `workspace_list_files`, `workspace_read_file`, `workspace_write_file`,
//! `workspace_exec`: path-safe operations rooted at `context.workspace`.

use std::process::Stdio;
use std::time::Duration;
#[cfg(unix)]
use std::os::unix::process::CommandExt as _;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use wre_workspace::resolve_within;

use crate::context::ToolContext;
use crate::error::ToolError;
use crate::registry::Tool;

const MAX_READ_CHARS: usize = 200_000;

#[derive(Default)]
pub struct WorkspaceListFilesTool;

#[derive(Deserialize)]
struct ListFilesArgs {
    #[serde(default = "default_dot")]
    path: String,
}
fn default_dot() -> String {
    ".".to_string()
}

#[async_trait]
impl Tool for WorkspaceListFilesTool {
    fn name(&self) -> &'static str {
        "workspace_list_files"
    }
    fn description(&self) -> &'static str {
        "List files and directories under a workspace-relative path."
    }
    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {"path": {"type": "string", "default": "."}}})
    }
    fn limitations(&self) -> &'static str {
        "Cannot list outside the run's workspace root."
    }

    async fn run(&self, args: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let args: ListFilesArgs = serde_json::from_value(args).map_err(|e| ToolError::InvalidArgs {
            tool: self.name().to_string(),
            reason: e.to_string(),
        })?;
        let root = ctx.workspace.workspace_root();
        let target = resolve_within(&root, &args.path)?;

        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&target)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            let name = entry.file_name().to_string_lossy().into_owned();
            entries.push(json!({
                "name": name,
                "isDir": metadata.is_dir(),
                "sizeBytes": metadata.len(),
            }));
        }
        Ok(json!({ "path": args.path, "entries": entries }))
    }
}

#[derive(Default)]
pub struct WorkspaceReadFileTool;

#[derive(Deserialize)]
struct ReadFileArgs {
    path: String,
}

#[async_trait]
impl Tool for WorkspaceReadFileTool {
    fn name(&self) -> &'static str {
        "workspace_read_file"
    }
    fn description(&self) -> &'static str {
        "Read a UTF-8 text file from the workspace."
    }
    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {"path": {"type": "string"}}, "required": ["path"]})
    }
    fn limitations(&self) -> &'static str {
        "Text only; content truncated to 200000 characters; cannot read outside the workspace root."
    }

    async fn run(&self, args: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let args: ReadFileArgs = serde_json::from_value(args).map_err(|e| ToolError::InvalidArgs {
            tool: self.name().to_string(),
            reason: e.to_string(),
        })?;
        let root = ctx.workspace.workspace_root();
        let target = resolve_within(&root, &args.path)?;
        let bytes = std::fs::read(&target)?;
        let text = String::from_utf8_lossy(&bytes);
        let truncated = text.chars().count() > MAX_READ_CHARS;
        let content: String = text.chars().take(MAX_READ_CHARS).collect();

        Ok(json!({
            "path": args.path,
            "content": content,
            "sizeBytes": bytes.len(),
            "truncated": truncated,
        }))
    }
}

#[derive(Default)]
pub struct WorkspaceWriteFileTool;

#[derive(Deserialize)]
struct WriteEntry {
    path: String,
    content: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WriteFileArgs {
    Batch { files: Vec<WriteEntry> },
    Single(WriteEntry),
}

#[async_trait]
impl Tool for WorkspaceWriteFileTool {
    fn name(&self) -> &'static str {
        "workspace_write_file"
    }
    fn description(&self) -> &'static str {
        "Write one file, or a batch of files, into the workspace."
    }
    fn input_schema(&self) -> Value {
        json!({
            "oneOf": [
                {"type": "object", "properties": {"path": {"type": "string"}, "content": {"type": "string"}}, "required": ["path", "content"]},
                {"type": "object", "properties": {"files": {"type": "array", "items": {"type": "object", "properties": {"path": {"type": "string"}, "content": {"type": "string"}}, "required": ["path", "content"]}}}, "required": ["files"]},
            ]
        })
    }
    fn limitations(&self) -> &'static str {
        "Cannot write outside the workspace root."
    }

    async fn run(&self, args: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let args: WriteFileArgs = serde_json::from_value(args).map_err(|e| ToolError::InvalidArgs {
            tool: self.name().to_string(),
            reason: e.to_string(),
        })?;
        let entries = match args {
            WriteFileArgs::Batch { files } => files,
            WriteFileArgs::Single(entry) => vec![entry],
        };

        let root = ctx.workspace.workspace_root();
        let mut written = Vec::with_capacity(entries.len());
        for entry in entries {
            let target = resolve_within(&root, &entry.path)?;
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&target, &entry.content)?;
            written.push(json!({ "path": entry.path, "sizeBytes": entry.content.len() }));
        }

        Ok(json!({ "written": written }))
    }
}

#[derive(Default)]
pub struct WorkspaceExecTool;

#[derive(Deserialize)]
struct WorkspaceExecArgs {
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default = "default_exec_timeout")]
    timeout_seconds: f64,
}
fn default_exec_timeout() -> f64 {
    10.0
}

#[async_trait]
impl Tool for WorkspaceExecTool {
    fn name(&self) -> &'static str {
        "workspace_exec"
    }
    fn description(&self) -> &'static str {
        "Run a command with its working directory set to the run's workspace root."
    }
    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {"type": "string"},
                "args": {"type": "array", "items": {"type": "string"}},
                "timeout_seconds": {"type": "number", "minimum": 0.25, "maximum": 30, "default": 10.0},
            },
            "required": ["command"],
        })
    }
    fn limitations(&self) -> &'static str {
        "Subject to the same CPU/memory/file limits as sandbox_exec; output truncated."
    }

    async fn run(&self, args: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let args: WorkspaceExecArgs = serde_json::from_value(args).map_err(|e| ToolError::InvalidArgs {
            tool: self.name().to_string(),
            reason: e.to_string(),
        })?;
        let timeout = args.timeout_seconds.clamp(0.25, 30.0);
        let root = ctx.workspace.workspace_root();

        let mut command = tokio::process::Command::new(&args.command);
        command
            .args(&args.args)
            .current_dir(&root)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        unsafe {
            command.pre_exec(|| {
                wre_sandbox::rlimits::apply(256, 10.0);
                Ok(())
            });
        }

        let output = tokio::time::timeout(Duration::from_secs_f64(timeout), command.output()).await;
        match output {
            Ok(Ok(out)) => Ok(json!({
                "stdout": String::from_utf8_lossy(&out.stdout),
                "stderr": String::from_utf8_lossy(&out.stderr),
                "returnCode": out.status.code(),
                "timedOut": false,
            })),
            Ok(Err(err)) => Err(ToolError::Io(err)),
            Err(_) => Ok(json!({
                "stdout": "",
                "stderr": "",
                "returnCode": Value::Null,
                "timedOut": true,
            })),
        }
    }
}
