//! Upload materialization: scanning a run's `inputs` value graph for
//! entries that look like uploaded files and writing them to disk
//! (`spec.md` §4.3).

use base64::Engine as _;
use serde_json::{Map, Value};

use crate::error::WorkspaceError;
use crate::layout::RunWorkspace;
use crate::sanitize::{dedupe_suffix, sanitize_name};

/// One materialized (or attempted) upload, recorded in
/// `uploaded_files_manifest.json`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MaterializedUpload {
    pub name: String,
    pub path: String,
    #[serde(rename = "sizeBytes")]
    pub size_bytes: u64,
    pub kind: String,
    pub truncated: bool,
}

/// Scan `inputs` for upload-shaped objects (`{name, mimeType|kind|content}`)
/// and materialize each one under `workspace.user_uploads_dir()`.
///
/// Returns the manifest of every upload found, in depth-first encounter
/// order. A name colliding with an earlier upload in the same run gets a
/// `_2`, `_3`, ... suffix before its extension.
///
/// # Errors
/// Returns [`WorkspaceError::Io`] if a file write fails.
pub fn materialize_uploads(
    inputs: &Value,
    workspace: &RunWorkspace,
) -> Result<Vec<MaterializedUpload>, WorkspaceError> {
    let mut manifest = Vec::new();
    let mut used_names: Vec<String> = Vec::new();
    walk(inputs, workspace, &mut manifest, &mut used_names)?;
    Ok(manifest)
}

fn walk(
    value: &Value,
    workspace: &RunWorkspace,
    manifest: &mut Vec<MaterializedUpload>,
    used_names: &mut Vec<String>,
) -> Result<(), WorkspaceError> {
    match value {
        Value::Object(map) => {
            if looks_like_upload(map) {
                manifest.push(materialize_one(map, workspace, used_names)?);
            } else {
                for v in map.values() {
                    walk(v, workspace, manifest, used_names)?;
                }
            }
        }
        Value::Array(items) => {
            for v in items {
                walk(v, workspace, manifest, used_names)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn looks_like_upload(map: &Map<String, Value>) -> bool {
    matches!(map.get("name"), Some(Value::String(_)))
        && (map.contains_key("mimeType") || map.contains_key("kind") || map.contains_key("content"))
}

fn materialize_one(
    map: &Map<String, Value>,
    workspace: &RunWorkspace,
    used_names: &mut Vec<String>,
) -> Result<MaterializedUpload, WorkspaceError> {
    let raw_name = map
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("upload");
    let kind = map
        .get("kind")
        .and_then(Value::as_str)
        .unwrap_or("text")
        .to_string();
    let content = map.get("content").and_then(Value::as_str).unwrap_or("");

    let (bytes, decode_ok): (Vec<u8>, bool) = match kind.as_str() {
        "text" => (content.as_bytes().to_vec(), true),
        "data_url" => decode_data_url(content),
        _ if map.get("content").is_some_and(Value::is_string) => {
            (content.as_bytes().to_vec(), true)
        }
        _ => (
            format!(
                "{{\"error\":\"unsupported upload kind\",\"kind\":{kind:?}}}"
            )
            .into_bytes(),
            false,
        ),
    };

    let base_name = sanitize_name(raw_name, "upload");
    let final_name = unique_name(&base_name, used_names);
    used_names.push(final_name.clone());

    let dest = workspace.user_uploads_dir().join(&final_name);
    std::fs::write(&dest, &bytes)?;

    let truncated = !decode_ok;
    if truncated {
        let meta = serde_json::json!({
            "name": final_name,
            "kind": kind,
            "decodeFailed": true,
        });
        let sidecar = workspace
            .user_uploads_dir()
            .join(format!("{final_name}.upload_meta.json"));
        RunWorkspace::write_json(&sidecar, &meta)?;
    }

    Ok(MaterializedUpload {
        name: final_name.clone(),
        path: format!("user_uploads/{final_name}"),
        size_bytes: bytes.len() as u64,
        kind,
        truncated,
    })
}

fn unique_name(base_name: &str, used_names: &[String]) -> String {
    let mut attempt = 1;
    loop {
        let candidate = dedupe_suffix(base_name, attempt);
        if !used_names.contains(&candidate) {
            return candidate;
        }
        attempt += 1;
    }
}

/// Parse a `data:[<mediatype>][;base64],<data>` URL. Returns the decoded
/// bytes and whether decoding fully succeeded.
fn decode_data_url(raw: &str) -> (Vec<u8>, bool) {
    let Some(rest) = raw.strip_prefix("data:") else {
        return (raw.as_bytes().to_vec(), false);
    };
    let Some((header, data)) = rest.split_once(',') else {
        return (raw.as_bytes().to_vec(), false);
    };

    if header.contains(";base64") {
        match base64::engine::general_purpose::STANDARD.decode(data) {
            Ok(bytes) => (bytes, true),
            Err(_) => (data.as_bytes().to_vec(), false),
        }
    } else {
        match urlencoding_decode(data) {
            Ok(bytes) => (bytes, true),
            Err(_) => (data.as_bytes().to_vec(), false),
        }
    }
}

fn urlencoding_decode(data: &str) -> Result<Vec<u8>, std::str::Utf8Error> {
    Ok(url::form_urlencoded::parse(data.as_bytes())
        .map(|(k, v)| format!("{k}{v}"))
        .collect::<String>()
        .into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn materializes_text_upload() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = RunWorkspace::create(tmp.path(), "wfr_1").unwrap();
        let inputs = json!({"file": {"name": "notes.txt", "kind": "text", "content": "hello"}});
        let manifest = materialize_uploads(&inputs, &ws).unwrap();
        assert_eq!(manifest.len(), 1);
        assert_eq!(manifest[0].name, "notes.txt");
        assert!(!manifest[0].truncated);
        let written = std::fs::read_to_string(ws.user_uploads_dir().join("notes.txt")).unwrap();
        assert_eq!(written, "hello");
    }

    #[test]
    fn materializes_base64_data_url() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = RunWorkspace::create(tmp.path(), "wfr_1").unwrap();
        let encoded = base64::engine::general_purpose::STANDARD.encode("binary-ish");
        let inputs = json!({
            "file": {"name": "blob.bin", "kind": "data_url", "content": format!("data:application/octet-stream;base64,{encoded}")}
        });
        let manifest = materialize_uploads(&inputs, &ws).unwrap();
        assert!(!manifest[0].truncated);
        let written = std::fs::read(ws.user_uploads_dir().join("blob.bin")).unwrap();
        assert_eq!(written, b"binary-ish");
    }

    #[test]
    fn collisions_get_numbered_suffix() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = RunWorkspace::create(tmp.path(), "wfr_1").unwrap();
        let inputs = json!([
            {"name": "a.txt", "kind": "text", "content": "one"},
            {"name": "a.txt", "kind": "text", "content": "two"},
        ]);
        let manifest = materialize_uploads(&inputs, &ws).unwrap();
        let mut names: Vec<&str> = manifest.iter().map(|m| m.name.as_str()).collect();
        names.sort_unstable();
        assert_eq!(names, vec!["a.txt", "a_2.txt"]);
    }

    #[test]
    fn unsupported_kind_writes_placeholder() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = RunWorkspace::create(tmp.path(), "wfr_1").unwrap();
        let inputs = json!({"file": {"name": "weird.bin", "kind": "unsupported"}});
        let manifest = materialize_uploads(&inputs, &ws).unwrap();
        assert!(manifest[0].truncated);
        assert!(ws
            .user_uploads_dir()
            .join(format!("{}.upload_meta.json", manifest[0].name))
            .exists());
    }
}
