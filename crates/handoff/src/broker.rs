//! Handoff packet construction: the C4 algorithm from `spec.md` §4.4.

use serde_json::{Map, Value};
use wre_core::id::HandoffPacketId;
use wre_core::time::now_iso;
use wre_value::{deep_truncate, truncate_text};
use wre_workflow::{Edge, HandoffContract, Node};

use crate::model::{FieldResult, HandoffPacket, NodeOutput, PacketSchema};
use crate::path::json_path_get;
use crate::coerce::coerce_handoff_value;

const MAX_SUMMARY_CHARS: usize = 240;

/// Build a [`HandoffPacket`] from `source_output` for traversal of `edge`,
/// given the source and target nodes (for display names).
///
/// This is the total, side-effect-free core of the handoff broker; callers
/// are responsible for storing the result in a run's `_meta.handoffPackets`.
#[must_use]
pub fn build_handoff_packet(
    edge: &Edge,
    source_output: &NodeOutput,
    source_node: &Node,
    target_node: &Node,
) -> HandoffPacket {
    let contract = HandoffContract::normalize(edge.contract.as_ref(), &edge.handoff);
    let output_json = source_output.as_json();

    let mut payload = Map::new();
    let mut field_results = Vec::with_capacity(contract.fields.len());
    let mut missing_required_fields = Vec::new();

    for field in &contract.fields {
        let (found, raw) = json_path_get(&output_json, &field.source_path);
        let coerced = coerce_handoff_value(&raw, field.field_type);
        let sanitized = deep_truncate(&coerced);
        payload.insert(field.target_key.clone(), sanitized);

        if field.required && !found {
            missing_required_fields.push(field.target_key.clone());
        }
        field_results.push(FieldResult {
            target_key: field.target_key.clone(),
            source_path: field.source_path.clone(),
            resolved: found,
        });
    }

    let summary = resolve_summary(&payload, source_output, source_node, target_node);

    HandoffPacket {
        id: HandoffPacketId::generate().as_str().to_string(),
        label: edge.handoff.clone(),
        packet_type: contract.packet_type,
        from_node_id: edge.source.clone(),
        from_node_name: source_node.name.clone(),
        to_node_id: edge.target.clone(),
        to_node_name: target_node.name.clone(),
        summary,
        payload,
        schema: PacketSchema {
            fields: field_results,
        },
        missing_required_fields,
        generated_at: now_iso(),
    }
}

fn resolve_summary(
    payload: &Map<String, Value>,
    source_output: &NodeOutput,
    source_node: &Node,
    target_node: &Node,
) -> String {
    if let Some(Value::String(s)) = payload.get("summary") {
        if !s.is_empty() {
            return truncate_text(s, MAX_SUMMARY_CHARS);
        }
    }
    if !source_output.summary.is_empty() {
        return truncate_text(&source_output.summary, MAX_SUMMARY_CHARS);
    }
    let from = if source_node.name.is_empty() {
        &source_node.id
    } else {
        &source_node.name
    };
    let to = if target_node.name.is_empty() {
        &target_node.id
    } else {
        &target_node.name
    };
    truncate_text(&format!("Handoff from {from} to {to}."), MAX_SUMMARY_CHARS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(id: &str, name: &str) -> Node {
        Node {
            id: id.to_string(),
            name: name.to_string(),
            role: "worker".to_string(),
            objective: "do stuff".to_string(),
        }
    }

    fn output(summary: &str) -> NodeOutput {
        NodeOutput {
            summary: summary.to_string(),
            details: Map::new(),
            data: Map::new(),
        }
    }

    #[test]
    fn default_contract_carries_summary_through() {
        let edge = Edge {
            source: "a".to_string(),
            target: "b".to_string(),
            handoff: "brief".to_string(),
            contract: None,
        };
        let out = output("Here is the summary");
        let packet = build_handoff_packet(&edge, &out, &node("a", "Alpha"), &node("b", "Beta"));
        assert_eq!(packet.payload["summary"], json!("Here is the summary"));
        assert_eq!(packet.summary, "Here is the summary");
        assert_eq!(packet.packet_type, "brief");
        assert!(packet.missing_required_fields.is_empty());
    }

    #[test]
    fn missing_required_field_is_recorded_non_fatally() {
        let edge = Edge {
            source: "a".to_string(),
            target: "b".to_string(),
            handoff: String::new(),
            contract: Some(HandoffContract {
                packet_type: "custom".to_string(),
                fields: vec![wre_workflow::HandoffField {
                    target_key: "summary".to_string(),
                    source_path: "nonexistent".to_string(),
                    field_type: wre_workflow::FieldType::String,
                    required: true,
                    description: String::new(),
                }],
            }),
        };
        let out = output("fallback summary");
        let packet = build_handoff_packet(&edge, &out, &node("a", ""), &node("b", ""));
        assert_eq!(packet.missing_required_fields, vec!["summary".to_string()]);
        assert_eq!(packet.summary, "fallback summary");
    }

    #[test]
    fn synthesized_summary_when_nothing_available() {
        let edge = Edge {
            source: "a".to_string(),
            target: "b".to_string(),
            handoff: String::new(),
            contract: None,
        };
        let out = output("");
        let packet = build_handoff_packet(&edge, &out, &node("a", "Alpha"), &node("b", "Beta"));
        assert_eq!(packet.summary, "Handoff from Alpha to Beta.");
    }

    #[test]
    fn payload_keys_equal_contract_target_keys() {
        let edge = Edge {
            source: "a".to_string(),
            target: "b".to_string(),
            handoff: "go".to_string(),
            contract: None,
        };
        let mut data = Map::new();
        data.insert("workspaceRefs".to_string(), json!([{"path": "x.txt"}]));
        let out = NodeOutput {
            summary: "s".to_string(),
            details: Map::new(),
            data,
        };
        let packet = build_handoff_packet(&edge, &out, &node("a", ""), &node("b", ""));
        let mut keys: Vec<&String> = packet.payload.keys().collect();
        keys.sort();
        assert_eq!(keys, vec!["details", "summary", "workspaceRefs"]);
    }
}
