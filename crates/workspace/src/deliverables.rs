//! Deliverable materialization and the run-level `manifest.json`
//! (`spec.md` §4.3, §4.7).

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::WorkspaceError;
use crate::layout::RunWorkspace;
use crate::safe_path::resolve_within;
use crate::sanitize::sanitize_name;

/// Whether a deliverable was written as a single file or a directory
/// (code bundle).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    File,
    Directory,
}

/// One entry of the run's deliverable manifest.
#[derive(Debug, Clone, Serialize)]
pub struct Deliverable {
    pub name: String,
    #[serde(rename = "artifactKind")]
    pub artifact_kind: ArtifactKind,
    pub path: String,
    #[serde(rename = "sizeBytes", skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    #[serde(rename = "fileCount", skip_serializing_if = "Option::is_none")]
    pub file_count: Option<u64>,
}

/// A payload is a code bundle when it is an object carrying a `files` map
/// of `relativePath -> string contents`.
#[must_use]
pub fn is_code_bundle(payload: &Value) -> bool {
    payload
        .get("files")
        .is_some_and(|f| f.is_object() && !f.as_object().unwrap().is_empty())
}

/// Write one deliverable under `workspace.deliverables_dir()`.
///
/// A payload shaped like `{files: {relativePath: content}}` is written as a
/// directory (with a `_manifest.json` listing its files); a string payload
/// is written as a single file verbatim; anything else is pretty-printed
/// JSON.
///
/// # Errors
/// Returns [`WorkspaceError`] on I/O or an unsafe file path inside a code
/// bundle.
pub fn write_deliverable(
    workspace: &RunWorkspace,
    name: &str,
    payload: &Value,
) -> Result<Deliverable, WorkspaceError> {
    let safe_name = sanitize_name(name, "deliverable");

    if is_code_bundle(payload) {
        write_code_bundle(workspace, &safe_name, payload)
    } else {
        write_single_file(workspace, &safe_name, payload)
    }
}

fn write_code_bundle(
    workspace: &RunWorkspace,
    safe_name: &str,
    payload: &Value,
) -> Result<Deliverable, WorkspaceError> {
    let bundle_dir = workspace.deliverables_dir().join(safe_name);
    std::fs::create_dir_all(&bundle_dir)?;

    let files = payload["files"].as_object().cloned().unwrap_or_default();
    let mut manifest_files = Vec::with_capacity(files.len());
    for (rel_path, contents) in &files {
        let Some(text) = contents.as_str() else {
            continue;
        };
        let resolved = resolve_within(&bundle_dir, rel_path)?;
        if let Some(parent) = resolved.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&resolved, text)?;
        manifest_files.push(rel_path.clone());
    }
    manifest_files.sort();

    let manifest = serde_json::json!({ "files": manifest_files });
    RunWorkspace::write_json(&bundle_dir.join("_manifest.json"), &manifest)?;

    Ok(Deliverable {
        name: safe_name.to_string(),
        artifact_kind: ArtifactKind::Directory,
        path: format!("deliverables/{safe_name}"),
        size_bytes: None,
        file_count: Some(manifest_files.len() as u64),
    })
}

fn write_single_file(
    workspace: &RunWorkspace,
    safe_name: &str,
    payload: &Value,
) -> Result<Deliverable, WorkspaceError> {
    let bytes: Vec<u8> = match payload {
        Value::String(s) => s.clone().into_bytes(),
        other => serde_json::to_vec_pretty(other)?,
    };
    let path = workspace.deliverables_dir().join(safe_name);
    std::fs::write(&path, &bytes)?;

    Ok(Deliverable {
        name: safe_name.to_string(),
        artifact_kind: ArtifactKind::File,
        path: format!("deliverables/{safe_name}"),
        size_bytes: Some(bytes.len() as u64),
        file_count: None,
    })
}

/// Write the run-level `manifest.json` alongside the materialized
/// deliverables.
///
/// # Errors
/// Returns [`WorkspaceError`] on serialization or I/O failure.
pub fn write_manifest(
    workspace: &RunWorkspace,
    run_id: &str,
    workflow_id: &str,
    workflow_name: &str,
    created_at: &str,
    deliverables: &[Deliverable],
) -> Result<(), WorkspaceError> {
    let mut obj = Map::new();
    obj.insert("runId".to_string(), Value::String(run_id.to_string()));
    obj.insert(
        "workflowId".to_string(),
        Value::String(workflow_id.to_string()),
    );
    obj.insert(
        "workflowName".to_string(),
        Value::String(workflow_name.to_string()),
    );
    obj.insert("createdAt".to_string(), Value::String(created_at.to_string()));
    obj.insert(
        "deliverables".to_string(),
        serde_json::to_value(deliverables)?,
    );
    RunWorkspace::write_json(&workspace.manifest_path(), &Value::Object(obj))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn writes_string_payload_as_single_file() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = RunWorkspace::create(tmp.path(), "wfr_1").unwrap();
        let d = write_deliverable(&ws, "final-output.md", &json!("# Hello")).unwrap();
        assert_eq!(d.artifact_kind, ArtifactKind::File);
        let content = std::fs::read_to_string(ws.deliverables_dir().join("final-output.md")).unwrap();
        assert_eq!(content, "# Hello");
    }

    #[test]
    fn writes_code_bundle_as_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = RunWorkspace::create(tmp.path(), "wfr_1").unwrap();
        let payload = json!({
            "kind": "code_bundle",
            "files": {"src/main.go": "package main\n", "README.md": "ok"}
        });
        let d = write_deliverable(&ws, "app", &payload).unwrap();
        assert_eq!(d.artifact_kind, ArtifactKind::Directory);
        assert_eq!(d.file_count, Some(2));
        assert!(ws.deliverables_dir().join("app/src/main.go").exists());
        assert!(ws.deliverables_dir().join("app/README.md").exists());
        assert!(ws.deliverables_dir().join("app/_manifest.json").exists());
    }

    #[test]
    fn structured_non_string_payload_is_pretty_json() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = RunWorkspace::create(tmp.path(), "wfr_1").unwrap();
        let d = write_deliverable(&ws, "data.json", &json!({"a": 1})).unwrap();
        let content = std::fs::read_to_string(ws.deliverables_dir().join("data.json")).unwrap();
        assert!(content.contains("\"a\""));
        assert_eq!(d.size_bytes, Some(content.len() as u64));
    }
}
