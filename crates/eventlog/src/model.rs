//! Event log entry shape (`spec.md` §4.5).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Category of a logged event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Lifecycle,
    Input,
    Handoff,
    Thinking,
    Output,
    Error,
    Control,
}

/// Maximum length of an event's `message` field.
pub const MAX_MESSAGE_CHARS: usize = 500;

/// One append-only, sequence-stamped run event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub seq: u64,
    pub timestamp: String,
    pub category: EventCategory,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "nodeId")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl Event {
    #[must_use]
    pub fn is_node_event(&self) -> bool {
        self.node_id.is_some()
    }
}
