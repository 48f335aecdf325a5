//! Path-safety checks for user-supplied auxiliary file names.

use std::path::{Component, Path, PathBuf};

use crate::error::SandboxError;

/// Validate that `raw_path` is a relative path with no `.`/`..` segments and
/// resolve it against `base`.
///
/// Backslashes are normalized to forward slashes first (mirroring the
/// original runtime's Windows-path tolerance) before component checks run.
///
/// # Errors
/// Returns [`SandboxError::UnsafePath`] for empty, absolute, or
/// dot/dot-dot-containing paths.
pub fn safe_relative_path(base: &Path, raw_path: &str) -> Result<PathBuf, SandboxError> {
    let normalized = raw_path.replace('\\', "/");
    if normalized.trim().is_empty() {
        return Err(SandboxError::UnsafePath(raw_path.to_string()));
    }

    let candidate = Path::new(&normalized);
    if candidate.is_absolute() {
        return Err(SandboxError::UnsafePath(raw_path.to_string()));
    }

    for component in candidate.components() {
        match component {
            Component::Normal(part) => {
                if part.is_empty() {
                    return Err(SandboxError::UnsafePath(raw_path.to_string()));
                }
            }
            _ => return Err(SandboxError::UnsafePath(raw_path.to_string())),
        }
    }

    Ok(base.join(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_absolute_paths() {
        let base = Path::new("/tmp/sandbox");
        assert!(safe_relative_path(base, "/etc/passwd").is_err());
    }

    #[test]
    fn rejects_dotdot_segments() {
        let base = Path::new("/tmp/sandbox");
        assert!(safe_relative_path(base, "../escape.txt").is_err());
        assert!(safe_relative_path(base, "a/../../b").is_err());
    }

    #[test]
    fn rejects_empty() {
        let base = Path::new("/tmp/sandbox");
        assert!(safe_relative_path(base, "").is_err());
        assert!(safe_relative_path(base, "   ").is_err());
    }

    #[test]
    fn accepts_nested_relative_path() {
        let base = Path::new("/tmp/sandbox");
        let resolved = safe_relative_path(base, "sub/dir/file.txt").unwrap();
        assert_eq!(resolved, Path::new("/tmp/sandbox/sub/dir/file.txt"));
    }

    #[test]
    fn normalizes_backslashes() {
        let base = Path::new("/tmp/sandbox");
        let resolved = safe_relative_path(base, "sub\\file.txt").unwrap();
        assert_eq!(resolved, Path::new("/tmp/sandbox/sub/file.txt"));
    }
}
