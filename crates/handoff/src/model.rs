//! Node output and handoff packet data model.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A stable pointer at a path inside a run's workspace, carrying provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceRef {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "sourceTool")]
    pub source_tool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "sizeBytes")]
    pub size_bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "fileCount")]
    pub file_count: Option<u64>,
}

impl WorkspaceRef {
    /// Dedup key used when merging auto-derived refs with model-supplied
    /// ones: `path|operation|kind|sourceTool`.
    #[must_use]
    pub fn dedup_key(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.path,
            self.operation.as_deref().unwrap_or(""),
            self.kind.as_deref().unwrap_or(""),
            self.source_tool.as_deref().unwrap_or(""),
        )
    }
}

/// The output of a completed node's agent decision loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeOutput {
    pub summary: String,
    #[serde(default)]
    pub details: Map<String, Value>,
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl NodeOutput {
    /// `data.workspaceRefs`, deserialized if present and well-formed.
    #[must_use]
    pub fn workspace_refs(&self) -> Vec<WorkspaceRef> {
        self.data
            .get("workspaceRefs")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    /// Represent this output as a plain JSON object, the shape
    /// [`crate::path::json_path_get`] navigates over.
    #[must_use]
    pub fn as_json(&self) -> Value {
        Value::Object(Map::from_iter([
            ("summary".to_string(), Value::String(self.summary.clone())),
            ("details".to_string(), Value::Object(self.details.clone())),
            ("data".to_string(), Value::Object(self.data.clone())),
        ]))
    }
}

/// Per-field resolution report embedded in a packet's `schema.fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldResult {
    #[serde(rename = "targetKey")]
    pub target_key: String,
    #[serde(rename = "sourcePath")]
    pub source_path: String,
    pub resolved: bool,
}

/// Schema section of a [`HandoffPacket`]: the per-field resolution report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketSchema {
    pub fields: Vec<FieldResult>,
}

/// A typed message produced from a source node's output per a declared
/// contract, consumed by a target node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffPacket {
    pub id: String,
    pub label: String,
    #[serde(rename = "packetType")]
    pub packet_type: String,
    #[serde(rename = "fromNodeId")]
    pub from_node_id: String,
    #[serde(rename = "fromNodeName")]
    pub from_node_name: String,
    #[serde(rename = "toNodeId")]
    pub to_node_id: String,
    #[serde(rename = "toNodeName")]
    pub to_node_name: String,
    pub summary: String,
    pub payload: Map<String, Value>,
    pub schema: PacketSchema,
    #[serde(rename = "missingRequiredFields")]
    pub missing_required_fields: Vec<String>,
    #[serde(rename = "generatedAt")]
    pub generated_at: String,
}
