//! The append-only event log itself.

use std::collections::HashMap;

use serde_json::Value;
use wre_core::time::now_iso;
use wre_value::{deep_truncate, truncate_text};

use crate::model::{Event, EventCategory, MAX_MESSAGE_CHARS};

/// A run's event log: a monotonic `seq` counter, the full event list, and a
/// per-node projection of it.
///
/// Callers are responsible for holding whatever run-level lock `spec.md`
/// §5 requires before calling [`EventLog::append`] — this type has no
/// internal synchronization of its own, matching the immutable-snapshot
/// pattern used by the scheduler (the log lives inside the mutex-guarded
/// run record).
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    seq: u64,
    events: Vec<Event>,
    per_node: HashMap<String, Vec<Event>>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one event, stamping it with the next `seq` and the current
    /// time. The message is truncated to [`MAX_MESSAGE_CHARS`] and the
    /// payload is run through the value sanitizer before storage.
    ///
    /// When `node_id` is set, a copy is also appended to that node's
    /// per-node log.
    pub fn append(
        &mut self,
        category: EventCategory,
        title: impl Into<String>,
        message: impl AsRef<str>,
        node_id: Option<String>,
        payload: Option<Value>,
    ) -> Event {
        self.seq += 1;
        let event = Event {
            id: format!("evt_{}", self.seq),
            seq: self.seq,
            timestamp: now_iso(),
            category,
            title: title.into(),
            message: truncate_text(message.as_ref(), MAX_MESSAGE_CHARS),
            node_id: node_id.clone(),
            payload: payload.as_ref().map(deep_truncate),
        };

        if let Some(id) = node_id {
            self.per_node.entry(id).or_default().push(event.clone());
        }
        self.events.push(event.clone());
        event
    }

    #[must_use]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    #[must_use]
    pub fn all(&self) -> &[Event] {
        &self.events
    }

    #[must_use]
    pub fn node_log(&self, node_id: &str) -> &[Event] {
        self.per_node.get(node_id).map_or(&[], Vec::as_slice)
    }

    /// Events with `seq > cursor`, in ascending `seq` order.
    #[must_use]
    pub fn since(&self, cursor: i64) -> Vec<&Event> {
        self.events
            .iter()
            .filter(|e| i64::try_from(e.seq).unwrap_or(i64::MAX) > cursor)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn seq_strictly_increases() {
        let mut log = EventLog::new();
        let a = log.append(EventCategory::Lifecycle, "t", "m", None, None);
        let b = log.append(EventCategory::Lifecycle, "t", "m", None, None);
        assert!(a.seq < b.seq);
    }

    #[test]
    fn message_is_truncated() {
        let mut log = EventLog::new();
        let long = "x".repeat(600);
        let event = log.append(EventCategory::Error, "t", &long, None, None);
        assert!(event.message.chars().count() <= MAX_MESSAGE_CHARS + 1);
    }

    #[test]
    fn node_scoped_event_appears_in_both_logs() {
        let mut log = EventLog::new();
        log.append(
            EventCategory::Output,
            "t",
            "m",
            Some("n1".to_string()),
            None,
        );
        assert_eq!(log.all().len(), 1);
        assert_eq!(log.node_log("n1").len(), 1);
        assert_eq!(log.node_log("n2").len(), 0);
    }

    #[test]
    fn payload_is_sanitized() {
        let mut log = EventLog::new();
        let huge = json!({"items": (0..20).collect::<Vec<_>>()});
        let event = log.append(EventCategory::Input, "t", "m", None, Some(huge));
        let payload = event.payload.unwrap();
        assert!(payload["items"].as_array().unwrap().len() <= 13);
    }

    #[test]
    fn since_returns_events_after_cursor() {
        let mut log = EventLog::new();
        log.append(EventCategory::Lifecycle, "a", "m", None, None);
        log.append(EventCategory::Lifecycle, "b", "m", None, None);
        let since = log.since(0);
        assert_eq!(since.len(), 2);
        let since_one = log.since(1);
        assert_eq!(since_one.len(), 1);
        assert_eq!(since_one[0].title, "b");
    }
}
