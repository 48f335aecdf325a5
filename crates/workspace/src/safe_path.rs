//! Workspace-root-relative path resolution.
//!
//! Every workspace file tool (`workspace_list_files`, `workspace_read_file`,
//! `workspace_write_file`, `workspace_exec`) routes user-supplied paths
//! through [`resolve_within`] first.

use std::path::{Path, PathBuf};

use crate::error::WorkspaceError;

/// Resolve `relative` against `root`, purely lexically (no filesystem
/// access, so this works for paths that don't exist yet).
///
/// `..` segments pop a previously-pushed segment rather than escaping past
/// `root`; a `..` with nothing left to pop is rejected as an escape attempt
/// rather than silently clamped, since a silent clamp would let a crafted
/// path alias an unrelated workspace-root-adjacent directory.
///
/// # Errors
/// [`WorkspaceError::AbsolutePath`] if `relative` is absolute.
/// [`WorkspaceError::PathEscapesRoot`] if the resolved path would leave
/// `root`.
pub fn resolve_within(root: &Path, relative: &str) -> Result<PathBuf, WorkspaceError> {
    let normalized = relative.replace('\\', "/");
    if Path::new(&normalized).is_absolute() {
        return Err(WorkspaceError::AbsolutePath(relative.to_string()));
    }

    let mut stack: Vec<&str> = Vec::new();
    for segment in normalized.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                if stack.pop().is_none() {
                    return Err(WorkspaceError::PathEscapesRoot(relative.to_string()));
                }
            }
            other => stack.push(other),
        }
    }

    let mut resolved = root.to_path_buf();
    for segment in stack {
        resolved.push(segment);
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_simple_relative_path() {
        let root = Path::new("/runs/wfr_1/workspace");
        let resolved = resolve_within(root, "reports/out.txt").unwrap();
        assert_eq!(resolved, Path::new("/runs/wfr_1/workspace/reports/out.txt"));
    }

    #[test]
    fn rejects_absolute_path() {
        let root = Path::new("/runs/wfr_1/workspace");
        assert!(resolve_within(root, "/etc/passwd").is_err());
    }

    #[test]
    fn rejects_escape_above_root() {
        let root = Path::new("/runs/wfr_1/workspace");
        assert!(resolve_within(root, "../../etc/passwd").is_err());
    }

    #[test]
    fn dotdot_within_bounds_is_allowed() {
        let root = Path::new("/runs/wfr_1/workspace");
        let resolved = resolve_within(root, "a/b/../c.txt").unwrap();
        assert_eq!(resolved, Path::new("/runs/wfr_1/workspace/a/c.txt"));
    }

    #[test]
    fn dot_segments_are_ignored() {
        let root = Path::new("/runs/wfr_1/workspace");
        let resolved = resolve_within(root, "./a/./b.txt").unwrap();
        assert_eq!(resolved, Path::new("/runs/wfr_1/workspace/a/b.txt"));
    }
}
