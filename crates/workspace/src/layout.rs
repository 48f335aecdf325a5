//! Per-run workspace directory layout (`spec.md` §4.3).

use std::path::{Path, PathBuf};

use crate::error::WorkspaceError;
use crate::sanitize::sanitize_name;

/// Default runs root, relative to the application directory, when
/// `WORKFLOW_RUN_ARTIFACTS_DIR` is unset.
pub const DEFAULT_RUNS_ROOT: &str = ".ninth-seat-artifacts/workflow-runs";

/// The on-disk layout rooted at `<runs-root>/<run_id>/`.
#[derive(Debug, Clone)]
pub struct RunWorkspace {
    run_root: PathBuf,
}

impl RunWorkspace {
    /// Create the full directory tree for a new run under `runs_root`.
    ///
    /// `run_id` is sanitized via [`sanitize_name`] before use as a
    /// directory name, so a run id can never escape `runs_root`.
    ///
    /// # Errors
    /// Returns [`WorkspaceError::Io`] if directory creation fails.
    pub fn create(runs_root: &Path, run_id: &str) -> Result<Self, WorkspaceError> {
        let safe_run_id = sanitize_name(run_id, "run");
        let run_root = runs_root.join(safe_run_id);

        for dir in [
            Self::workspace_subdir(&run_root, "agent_scripts"),
            Self::workspace_subdir(&run_root, "user_uploads"),
            Self::workspace_subdir(&run_root, "inputs"),
            Self::workspace_subdir(&run_root, "deliverables"),
        ] {
            std::fs::create_dir_all(&dir)?;
        }

        Ok(Self { run_root })
    }

    fn workspace_subdir(run_root: &Path, name: &str) -> PathBuf {
        run_root.join("workspace").join(name)
    }

    #[must_use]
    pub fn run_root(&self) -> &Path {
        &self.run_root
    }

    #[must_use]
    pub fn workspace_root(&self) -> PathBuf {
        self.run_root.join("workspace")
    }

    #[must_use]
    pub fn agent_scripts_dir(&self) -> PathBuf {
        self.run_root.join("workspace").join("agent_scripts")
    }

    #[must_use]
    pub fn user_uploads_dir(&self) -> PathBuf {
        self.run_root.join("workspace").join("user_uploads")
    }

    #[must_use]
    pub fn inputs_dir(&self) -> PathBuf {
        self.run_root.join("workspace").join("inputs")
    }

    #[must_use]
    pub fn deliverables_dir(&self) -> PathBuf {
        self.run_root.join("workspace").join("deliverables")
    }

    #[must_use]
    pub fn run_inputs_path(&self) -> PathBuf {
        self.inputs_dir().join("run_inputs.json")
    }

    #[must_use]
    pub fn run_context_path(&self) -> PathBuf {
        self.inputs_dir().join("run_context.json")
    }

    #[must_use]
    pub fn uploaded_files_manifest_path(&self) -> PathBuf {
        self.inputs_dir().join("uploaded_files_manifest.json")
    }

    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.deliverables_dir().join("manifest.json")
    }

    /// Write `value` as pretty-printed JSON at `path`.
    ///
    /// # Errors
    /// Returns [`WorkspaceError`] on serialization or I/O failure.
    pub fn write_json(path: &Path, value: &serde_json::Value) -> Result<(), WorkspaceError> {
        let rendered = serde_json::to_string_pretty(value)?;
        std::fs::write(path, rendered)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_builds_expected_subdirectories() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = RunWorkspace::create(tmp.path(), "wfr_abc123").unwrap();
        assert!(ws.agent_scripts_dir().is_dir());
        assert!(ws.user_uploads_dir().is_dir());
        assert!(ws.inputs_dir().is_dir());
        assert!(ws.deliverables_dir().is_dir());
    }

    #[test]
    fn sanitizes_run_id_for_directory_name() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = RunWorkspace::create(tmp.path(), "../escape").unwrap();
        assert!(ws.run_root().starts_with(tmp.path()));
    }
}
