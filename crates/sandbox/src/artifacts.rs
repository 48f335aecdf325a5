//! Post-execution artifact enumeration.

use std::path::Path;

use crate::model::{Artifact, Bounds};

/// Walk `base_dir` and collect up to [`Bounds::MAX_ARTIFACT_FILES`] files,
/// each with its size and (for files at or under
/// [`Bounds::ARTIFACT_PREVIEW_BYTES`]) a UTF-8 text preview truncated to
/// [`Bounds::ARTIFACT_PREVIEW_CHARS`] characters.
///
/// Files that fail a UTF-8 decode are included with no preview rather than
/// skipped entirely.
pub fn collect_artifacts(base_dir: &Path) -> Vec<Artifact> {
    let mut entries = Vec::new();
    collect_into(base_dir, base_dir, &mut entries);
    entries.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    entries
        .into_iter()
        .take(Bounds::MAX_ARTIFACT_FILES)
        .collect()
}

fn collect_into(base_dir: &Path, dir: &Path, out: &mut Vec<Artifact>) {
    let Ok(read_dir) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in read_dir.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_into(base_dir, &path, out);
            continue;
        }
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }
        let relative_path = path
            .strip_prefix(base_dir)
            .unwrap_or(&path)
            .to_string_lossy()
            .replace('\\', "/");
        let size_bytes = metadata.len();
        let preview = if size_bytes <= Bounds::ARTIFACT_PREVIEW_BYTES as u64 {
            std::fs::read(&path).ok().and_then(|bytes| {
                String::from_utf8(bytes)
                    .ok()
                    .map(|text| text.chars().take(Bounds::ARTIFACT_PREVIEW_CHARS).collect())
            })
        } else {
            None
        };
        out.push(Artifact {
            relative_path,
            size_bytes,
            preview,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_small_text_file_with_preview() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("out.txt"), "hello").unwrap();
        let artifacts = collect_artifacts(dir.path());
        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].relative_path, "out.txt");
        assert_eq!(artifacts[0].preview.as_deref(), Some("hello"));
    }

    #[test]
    fn nested_directories_use_posix_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/nested.txt"), "x").unwrap();
        let artifacts = collect_artifacts(dir.path());
        assert_eq!(artifacts[0].relative_path, "sub/nested.txt");
    }

    #[test]
    fn binary_file_has_no_preview() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bin.dat"), [0xFF, 0xFE, 0x00, 0xFF]).unwrap();
        let artifacts = collect_artifacts(dir.path());
        assert_eq!(artifacts[0].preview, None);
    }

    #[test]
    fn caps_at_max_artifact_files() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..30 {
            std::fs::write(dir.path().join(format!("f{i:02}.txt")), "x").unwrap();
        }
        let artifacts = collect_artifacts(dir.path());
        assert_eq!(artifacts.len(), Bounds::MAX_ARTIFACT_FILES);
    }
}
