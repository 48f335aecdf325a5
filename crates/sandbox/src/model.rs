//! Request/response shapes for `sandbox_exec`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

fn default_language() -> Language {
    Language::Python
}
fn default_timeout() -> f64 {
    5.0
}
fn default_memory_limit_mb() -> u32 {
    256
}
fn default_max_output_chars() -> usize {
    20_000
}

/// Interpreter to run the supplied code with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Bash,
}

impl Language {
    #[must_use]
    pub fn entrypoint_name(self) -> &'static str {
        match self {
            Self::Python => "main.py",
            Self::Bash => "main.sh",
        }
    }
}

/// Validated bounds on every numeric/length field of [`SandboxExecArgs`].
pub struct Bounds;
impl Bounds {
    pub const CODE_MAX_CHARS: usize = 100_000;
    pub const STDIN_MAX_CHARS: usize = 100_000;
    pub const TIMEOUT_MIN_SECS: f64 = 0.25;
    pub const TIMEOUT_MAX_SECS: f64 = 30.0;
    pub const MEMORY_MIN_MB: u32 = 32;
    pub const MEMORY_MAX_MB: u32 = 1024;
    pub const MAX_OUTPUT_CHARS_MIN: usize = 200;
    pub const MAX_OUTPUT_CHARS_MAX: usize = 200_000;
    pub const MAX_AUX_FILES: usize = 20;
    pub const MAX_FILE_PATH_CHARS: usize = 200;
    pub const MAX_FILE_CONTENT_CHARS: usize = 200_000;
    pub const MAX_ARTIFACT_FILES: usize = 20;
    pub const ARTIFACT_PREVIEW_BYTES: usize = 8192;
    pub const ARTIFACT_PREVIEW_CHARS: usize = 2000;
    pub const FILE_SIZE_LIMIT_BYTES: u64 = 5 * 1024 * 1024;
    pub const OPEN_FILES_LIMIT: u64 = 64;
    pub const CHILD_PROCESS_LIMIT: u64 = 64;
}

/// `sandbox_exec` tool arguments, clamped to the bounds in [`Bounds`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxExecArgs {
    #[serde(default = "default_language")]
    pub language: Language,
    pub code: String,
    #[serde(default)]
    pub stdin: String,
    #[serde(default = "default_timeout")]
    pub timeout_seconds: f64,
    #[serde(default = "default_memory_limit_mb")]
    pub memory_limit_mb: u32,
    #[serde(default = "default_max_output_chars")]
    pub max_output_chars: usize,
    #[serde(default)]
    pub files: HashMap<String, String>,
}

impl SandboxExecArgs {
    /// Clamp every bounded field into its valid range in place.
    pub fn clamp(&mut self) {
        self.code.truncate(Bounds::CODE_MAX_CHARS);
        self.stdin.truncate(Bounds::STDIN_MAX_CHARS);
        self.timeout_seconds = self
            .timeout_seconds
            .clamp(Bounds::TIMEOUT_MIN_SECS, Bounds::TIMEOUT_MAX_SECS);
        self.memory_limit_mb = self
            .memory_limit_mb
            .clamp(Bounds::MEMORY_MIN_MB, Bounds::MEMORY_MAX_MB);
        self.max_output_chars = self
            .max_output_chars
            .clamp(Bounds::MAX_OUTPUT_CHARS_MIN, Bounds::MAX_OUTPUT_CHARS_MAX);
    }
}

/// One file discovered under the sandbox working directory after execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(rename = "relativePath")]
    pub relative_path: String,
    #[serde(rename = "sizeBytes")]
    pub size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

/// Result of one `sandbox_exec` invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxExecResult {
    pub stdout: String,
    #[serde(rename = "stdoutTruncated")]
    pub stdout_truncated: bool,
    pub stderr: String,
    #[serde(rename = "stderrTruncated")]
    pub stderr_truncated: bool,
    #[serde(rename = "returnCode")]
    pub return_code: Option<i32>,
    #[serde(rename = "timedOut")]
    pub timed_out: bool,
    pub artifacts: Vec<Artifact>,
}
