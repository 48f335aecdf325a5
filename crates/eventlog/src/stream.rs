//! Wire shapes for `stream_run_events` (`spec.md` §4.5, §6 SSE format).

use serde::Serialize;
use serde_json::Value;

use crate::model::Event;

/// A `workspace:change` event synthesized from a log payload that carries
/// `workspaceRefs`.
#[derive(Debug, Clone, Serialize)]
pub struct WorkspaceChangeEvent {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "sourceTool")]
    pub source_tool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "nodeId")]
    pub node_id: Option<String>,
    pub seq: u64,
}

/// Extract one [`WorkspaceChangeEvent`] per entry of `event.payload.workspaceRefs`,
/// if present.
#[must_use]
pub fn synthesize_workspace_changes(event: &Event) -> Vec<WorkspaceChangeEvent> {
    let Some(payload) = &event.payload else {
        return Vec::new();
    };
    let Some(refs) = payload.get("workspaceRefs").and_then(Value::as_array) else {
        return Vec::new();
    };

    refs.iter()
        .filter_map(|r| {
            let path = r.get("path")?.as_str()?.to_string();
            Some(WorkspaceChangeEvent {
                path,
                operation: string_field(r, "operation"),
                kind: string_field(r, "kind"),
                source_tool: string_field(r, "sourceTool"),
                node_id: event.node_id.clone(),
                seq: event.seq,
            })
        })
        .collect()
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

/// One item on the `stream_run_events` wire, matching the SSE event names
/// from `spec.md` §6: `log`, `workspace:change`, `state`, `run:complete`,
/// `error`.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Log(Event),
    WorkspaceChange(WorkspaceChangeEvent),
    /// Run/node status snapshot. Kept as a `Value` here rather than a typed
    /// struct: the run shape lives in `wre-engine`, which depends on this
    /// crate, not the other way around.
    State(Value),
    RunComplete,
    Error(String),
}

impl StreamEvent {
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Log(_) => "log",
            Self::WorkspaceChange(_) => "workspace:change",
            Self::State(_) => "state",
            Self::RunComplete => "run:complete",
            Self::Error(_) => "error",
        }
    }

    /// The `data:` payload alone, serialized to JSON.
    #[must_use]
    pub fn data_json(&self) -> String {
        match self {
            Self::Log(e) => serde_json::to_string(e).unwrap_or_default(),
            Self::WorkspaceChange(c) => serde_json::to_string(c).unwrap_or_default(),
            Self::State(v) => serde_json::to_string(v).unwrap_or_default(),
            Self::RunComplete => "{}".to_string(),
            Self::Error(msg) => serde_json::json!({ "error": msg }).to_string(),
        }
    }

    /// Render as `event: <name>\ndata: <json>\n\n`.
    #[must_use]
    pub fn to_sse(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.event_name(), self.data_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EventCategory;
    use serde_json::json;

    fn log_event(payload: Value) -> Event {
        Event {
            id: "evt_1".to_string(),
            seq: 1,
            timestamp: "2026-01-01T00:00:00.000Z".to_string(),
            category: EventCategory::Output,
            title: "t".to_string(),
            message: "m".to_string(),
            node_id: Some("n1".to_string()),
            payload: Some(payload),
        }
    }

    #[test]
    fn synthesizes_one_change_per_workspace_ref() {
        let event = log_event(json!({
            "workspaceRefs": [
                {"path": "a.txt", "operation": "write"},
                {"path": "b.txt", "operation": "read"},
            ]
        }));
        let changes = synthesize_workspace_changes(&event);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].path, "a.txt");
        assert_eq!(changes[0].node_id.as_deref(), Some("n1"));
    }

    #[test]
    fn no_workspace_refs_yields_nothing() {
        let event = log_event(json!({"other": 1}));
        assert!(synthesize_workspace_changes(&event).is_empty());
    }

    #[test]
    fn sse_format_matches_wire_spec() {
        let rendered = StreamEvent::RunComplete.to_sse();
        assert_eq!(rendered, "event: run:complete\ndata: {}\n\n");
    }
}
