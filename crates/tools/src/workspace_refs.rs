//! Derives [`WorkspaceRef`] entries describing paths touched by a
//! successful workspace-touching tool call (`spec.md` §4.2).

use serde_json::Value;
use wre_handoff::WorkspaceRef;

/// Build the `WorkspaceRef`s implied by a successful call to `tool_name`
/// with `args` that produced `result`. Returns an empty vec for tools with
/// no workspace footprint (`web_search`).
#[must_use]
pub fn derive_workspace_refs(tool_name: &str, args: &Value, result: &Value) -> Vec<WorkspaceRef> {
    match tool_name {
        "workspace_list_files" => {
            let path = args.get("path").and_then(Value::as_str).unwrap_or(".");
            let file_count = result
                .get("entries")
                .and_then(Value::as_array)
                .map(|a| a.len() as u64);
            vec![ref_for(path, "list", "workspace_list_files", None, file_count)]
        }
        "workspace_read_file" => {
            let path = args.get("path").and_then(Value::as_str).unwrap_or("");
            let size = result.get("sizeBytes").and_then(Value::as_u64);
            vec![ref_for(path, "read", "workspace_read_file", size, None)]
        }
        "workspace_write_file" => result
            .get("written")
            .and_then(Value::as_array)
            .map(|written| {
                written
                    .iter()
                    .filter_map(|w| {
                        let path = w.get("path")?.as_str()?;
                        let size = w.get("sizeBytes").and_then(Value::as_u64);
                        Some(ref_for(path, "write", "workspace_write_file", size, None))
                    })
                    .collect()
            })
            .unwrap_or_default(),
        "sandbox_exec" => result
            .get("artifacts")
            .and_then(Value::as_array)
            .map(|artifacts| {
                artifacts
                    .iter()
                    .filter_map(|a| {
                        let path = a.get("relativePath")?.as_str()?;
                        let size = a.get("sizeBytes").and_then(Value::as_u64);
                        Some(ref_for(path, "produce", "sandbox_exec", size, None))
                    })
                    .collect()
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn ref_for(
    path: &str,
    operation: &str,
    source_tool: &str,
    size_bytes: Option<u64>,
    file_count: Option<u64>,
) -> WorkspaceRef {
    WorkspaceRef {
        path: path.to_string(),
        kind: None,
        role: None,
        operation: Some(operation.to_string()),
        source_tool: Some(source_tool.to_string()),
        status: Some("ok".to_string()),
        note: None,
        purpose: None,
        cwd: None,
        size_bytes,
        file_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn derives_ref_for_write_file() {
        let args = json!({"path": "out.txt", "content": "hi"});
        let result = json!({"written": [{"path": "out.txt", "sizeBytes": 2}]});
        let refs = derive_workspace_refs("workspace_write_file", &args, &result);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].path, "out.txt");
        assert_eq!(refs[0].operation.as_deref(), Some("write"));
    }

    #[test]
    fn web_search_has_no_workspace_footprint() {
        let refs = derive_workspace_refs("web_search", &json!({}), &json!({"results": []}));
        assert!(refs.is_empty());
    }

    #[test]
    fn sandbox_exec_derives_refs_from_artifacts() {
        let result = json!({"artifacts": [{"relativePath": "out.csv", "sizeBytes": 10}]});
        let refs = derive_workspace_refs("sandbox_exec", &json!({}), &result);
        assert_eq!(refs[0].path, "out.csv");
        assert_eq!(refs[0].operation.as_deref(), Some("produce"));
    }
}
