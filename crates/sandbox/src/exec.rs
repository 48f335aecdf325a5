//! Subprocess execution: writes the sandbox's working directory, spawns the
//! interpreter under resource limits, and captures truncated output plus
//! resulting artifacts.

use std::process::Stdio;
use std::time::Duration;
#[cfg(unix)]
use std::os::unix::process::CommandExt as _;

use tokio::io::AsyncReadExt as _;
use tokio::process::Command;
use tracing::warn;

use crate::artifacts::collect_artifacts;
use crate::error::SandboxError;
use crate::model::{Bounds, Language, SandboxExecArgs, SandboxExecResult};
use crate::path::safe_relative_path;
use crate::rlimits;

/// Run `args` in a fresh temporary directory and return the captured
/// result. Never returns `Err` for a timeout or a non-zero exit — those are
/// represented in [`SandboxExecResult`]; `Err` is reserved for the
/// validation and filesystem-setup failures in `spec.md` §4.2.
///
/// # Errors
/// Returns [`SandboxError`] when auxiliary files fail validation (too many,
/// unsafe path, oversized) or the sandbox directory cannot be prepared.
pub async fn run_sandbox_exec(mut args: SandboxExecArgs) -> Result<SandboxExecResult, SandboxError> {
    args.clamp();

    if args.files.len() > Bounds::MAX_AUX_FILES {
        return Err(SandboxError::TooManyFiles(args.files.len()));
    }
    for (path, content) in &args.files {
        if path.chars().count() > Bounds::MAX_FILE_PATH_CHARS {
            return Err(SandboxError::FilePathTooLong(path.clone()));
        }
        if content.chars().count() > Bounds::MAX_FILE_CONTENT_CHARS {
            return Err(SandboxError::FileTooLarge(path.clone()));
        }
    }

    let dir = tempfile::Builder::new()
        .prefix("wre-sandbox-")
        .tempdir()?;
    let root = dir.path();

    for (path, content) in &args.files {
        let resolved = safe_relative_path(root, path)?;
        if let Some(parent) = resolved.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&resolved, content)?;
    }

    let entry_name = args.language.entrypoint_name();
    std::fs::write(root.join(entry_name), &args.code)?;

    let mut command = match args.language {
        Language::Python => {
            let mut c = Command::new("python3");
            c.args(["-I", entry_name]);
            c
        }
        Language::Bash => {
            let mut c = Command::new("bash");
            c.arg(entry_name);
            c
        }
    };

    command
        .current_dir(root)
        .env_clear()
        .env("PATH", "/usr/bin:/bin")
        .env("HOME", root)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    {
        let memory_limit_mb = args.memory_limit_mb;
        let timeout_seconds = args.timeout_seconds;
        unsafe {
            command.pre_exec(move || {
                rlimits::apply(memory_limit_mb, timeout_seconds);
                Ok(())
            });
        }
    }

    let mut child = command.spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        let payload = args.stdin.clone();
        tokio::spawn(async move {
            use tokio::io::AsyncWriteExt as _;
            let _ = stdin.write_all(payload.as_bytes()).await;
        });
    }

    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();
    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(pipe) = stdout_pipe.as_mut() {
            let _ = pipe.read_to_end(&mut buf).await;
        }
        buf
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Some(pipe) = stderr_pipe.as_mut() {
            let _ = pipe.read_to_end(&mut buf).await;
        }
        buf
    });

    let wait_result = tokio::time::timeout(
        Duration::from_secs_f64(args.timeout_seconds),
        child.wait(),
    )
    .await;

    let (timed_out, return_code) = match wait_result {
        Ok(Ok(status)) => (false, status.code()),
        Ok(Err(err)) => {
            warn!(error = %err, "sandbox child wait failed");
            (false, None)
        }
        Err(_) => {
            let _ = child.start_kill();
            let _ = child.wait().await;
            (true, None)
        }
    };

    let stdout_bytes = stdout_task.await.unwrap_or_default();
    let stderr_bytes = stderr_task.await.unwrap_or_default();
    let (stdout, stdout_truncated) =
        truncate_output(&stdout_bytes, args.max_output_chars);
    let (stderr, stderr_truncated) =
        truncate_output(&stderr_bytes, args.max_output_chars);

    let artifacts = collect_artifacts(root);

    Ok(SandboxExecResult {
        stdout,
        stdout_truncated,
        stderr,
        stderr_truncated,
        return_code,
        timed_out,
        artifacts,
    })
}

fn truncate_output(bytes: &[u8], max_chars: usize) -> (String, bool) {
    let text = String::from_utf8_lossy(bytes);
    if text.chars().count() <= max_chars {
        (text.into_owned(), false)
    } else {
        (text.chars().take(max_chars).collect(), true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_args(code: &str) -> SandboxExecArgs {
        SandboxExecArgs {
            language: Language::Bash,
            code: code.to_string(),
            stdin: String::new(),
            timeout_seconds: 5.0,
            memory_limit_mb: 256,
            max_output_chars: 20_000,
            files: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn rejects_too_many_files() {
        let mut args = base_args("echo hi");
        for i in 0..25 {
            args.files.insert(format!("f{i}.txt"), "x".to_string());
        }
        let err = run_sandbox_exec(args).await.unwrap_err();
        assert!(matches!(err, SandboxError::TooManyFiles(25)));
    }

    #[tokio::test]
    async fn rejects_unsafe_file_path() {
        let mut args = base_args("echo hi");
        args.files.insert("../escape.txt".to_string(), "x".to_string());
        let err = run_sandbox_exec(args).await.unwrap_err();
        assert!(matches!(err, SandboxError::UnsafePath(_)));
    }
}
