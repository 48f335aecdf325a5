//! Workflow template data model: nodes, edges, handoff contracts.

use serde::{Deserialize, Deserializer, Serialize};
use wre_core::slug::slugify;

/// A single agent node in a workflow template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub name: String,
    pub role: String,
    pub objective: String,
}

/// Field type a handoff value is coerced to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Array,
    Object,
    Json,
    Any,
}

impl FieldType {
    /// Parse a loosely-typed contract field type, coercing anything
    /// unrecognized to [`FieldType::Any`] rather than rejecting it.
    #[must_use]
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "string" => Self::String,
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            "array" => Self::Array,
            "object" => Self::Object,
            "json" => Self::Json,
            _ => Self::Any,
        }
    }
}

/// Deserializes leniently via [`FieldType::parse_lenient`] (`spec.md` §4.4
/// step 1: "coerce unknown `type` to `any`") rather than rejecting a
/// contract field carrying an unrecognized `type` string.
impl<'de> Deserialize<'de> for FieldType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse_lenient(&raw))
    }
}

/// One field of a [`HandoffContract`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffField {
    pub target_key: String,
    pub source_path: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: bool,
    pub description: String,
}

/// Contract governing how a source node's output is translated into a
/// [`crate::packet`]-shaped payload for a downstream node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffContract {
    pub packet_type: String,
    pub fields: Vec<HandoffField>,
}

/// Maximum number of fields retained on a handoff contract; extra fields are
/// clamped off during normalization, never rejected.
pub const MAX_CONTRACT_FIELDS: usize = 20;
/// Maximum length of a node id slug.
pub const MAX_NODE_ID_LEN: usize = 80;
/// Maximum node count in a template.
pub const MAX_NODES: usize = 30;

impl HandoffContract {
    /// The three-field default contract used when an edge declares no
    /// contract of its own, or declares a malformed one.
    ///
    /// `spec.md` §3 names `summary`/`details`/`workspaceRefs` as the default
    /// field set; this differs from the original Python runtime's two-field
    /// default (`summary`/`details`), which is superseded here per the
    /// spec's explicit data model.
    #[must_use]
    pub fn default_for_edge_label(handoff_label: &str) -> Self {
        let packet_type = slugify(handoff_label, "handoff_packet");
        Self {
            packet_type,
            fields: vec![
                HandoffField {
                    target_key: "summary".to_string(),
                    source_path: "summary".to_string(),
                    field_type: FieldType::String,
                    required: true,
                    description: "Primary summary from the source agent output.".to_string(),
                },
                HandoffField {
                    target_key: "details".to_string(),
                    source_path: "details".to_string(),
                    field_type: FieldType::Object,
                    required: false,
                    description: "Structured source agent details for downstream use."
                        .to_string(),
                },
                HandoffField {
                    target_key: "workspaceRefs".to_string(),
                    source_path: "data.workspaceRefs".to_string(),
                    field_type: FieldType::Array,
                    required: false,
                    description: "Workspace references produced by the source agent."
                        .to_string(),
                },
            ],
        }
    }

    /// Normalize a possibly-absent, possibly-malformed contract against an
    /// edge's free-text handoff label.
    ///
    /// Unknown field types coerce to [`FieldType::Any`]; fields missing a
    /// non-empty `target_key`/`source_path` are dropped; the field list is
    /// clamped to [`MAX_CONTRACT_FIELDS`]. If normalization leaves zero
    /// fields, falls back to the default contract's fields — this is a
    /// fixed point: normalizing an already-normalized contract is a no-op.
    #[must_use]
    pub fn normalize(contract: Option<&HandoffContract>, handoff_label: &str) -> Self {
        let default = Self::default_for_edge_label(handoff_label);
        let Some(raw) = contract else {
            return default;
        };

        let packet_type = slugify(&raw.packet_type, &default.packet_type);
        let fields: Vec<HandoffField> = raw
            .fields
            .iter()
            .filter(|f| !f.target_key.trim().is_empty() && !f.source_path.trim().is_empty())
            .take(MAX_CONTRACT_FIELDS)
            .map(|f| HandoffField {
                target_key: truncate_chars(&f.target_key, 80),
                source_path: truncate_chars(&f.source_path, 160),
                field_type: f.field_type,
                required: f.required,
                description: truncate_chars(&f.description, 240),
            })
            .collect();

        if fields.is_empty() {
            Self {
                packet_type,
                fields: default.fields,
            }
        } else {
            Self {
                packet_type,
                fields,
            }
        }
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

/// A directed edge between two nodes, carrying an optional handoff contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub handoff: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<HandoffContract>,
}

/// A user-authored workflow: nodes plus the edges connecting them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowTemplate {
    pub id: String,
    pub name: String,
    pub prompt: String,
    pub summary: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_type_deserializes_known_variants() {
        assert_eq!(
            serde_json::from_str::<FieldType>("\"string\"").unwrap(),
            FieldType::String
        );
        assert_eq!(
            serde_json::from_str::<FieldType>("\"BOOLEAN\"").unwrap(),
            FieldType::Boolean
        );
    }

    #[test]
    fn field_type_deserializes_unknown_as_any() {
        assert_eq!(
            serde_json::from_str::<FieldType>("\"datetime\"").unwrap(),
            FieldType::Any
        );
        assert_eq!(
            serde_json::from_str::<FieldType>("\"\"").unwrap(),
            FieldType::Any
        );
    }

    #[test]
    fn handoff_field_with_unknown_type_deserializes_without_error() {
        let field: HandoffField = serde_json::from_str(
            r#"{"target_key":"k","source_path":"p","type":"timestamp","required":false,"description":""}"#,
        )
        .unwrap();
        assert_eq!(field.field_type, FieldType::Any);
    }
}
