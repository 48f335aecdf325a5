//! # Value Sanitizer
//!
//! Bounded-depth deep truncation and stable JSON previews for arbitrary
//! [`serde_json::Value`] trees. Every value that reaches a log payload, an
//! LLM prompt, or a handoff packet passes through [`deep_truncate`] first so
//! that run state never grows unbounded and never leaks more than a fixed
//! number of characters of any single string.

use serde_json::{Map, Value, json};

/// Truncation limits applied by [`deep_truncate`].
#[derive(Debug, Clone, Copy)]
pub struct TruncateLimits {
    pub max_depth: usize,
    pub max_items: usize,
    pub max_text: usize,
}

impl Default for TruncateLimits {
    fn default() -> Self {
        Self {
            max_depth: 5,
            max_items: 12,
            max_text: 4000,
        }
    }
}

/// Deep-truncate `value` using the default limits.
#[must_use]
pub fn deep_truncate(value: &Value) -> Value {
    truncate_with(value, TruncateLimits::default())
}

/// Deep-truncate `value` using caller-supplied limits.
#[must_use]
pub fn truncate_with(value: &Value, limits: TruncateLimits) -> Value {
    truncate_at(value, limits, 0)
}

fn truncate_at(value: &Value, limits: TruncateLimits, depth: usize) -> Value {
    if depth >= limits.max_depth && (value.is_object() || value.is_array()) {
        return json!({
            "_truncated": true,
            "_type": type_name(value),
        });
    }

    match value {
        Value::String(s) => Value::String(truncate_text(s, limits.max_text)),
        Value::Array(items) => {
            let mut out: Vec<Value> = items
                .iter()
                .take(limits.max_items)
                .map(|v| truncate_at(v, limits, depth + 1))
                .collect();
            if items.len() > limits.max_items {
                out.push(json!({ "_truncated_items": items.len() - limits.max_items }));
            }
            Value::Array(out)
        }
        Value::Object(map) => {
            let mut out = Map::new();
            for (k, v) in map.iter().take(limits.max_items) {
                out.insert(k.clone(), truncate_at(v, limits, depth + 1));
            }
            if map.len() > limits.max_items {
                out.insert(
                    "_truncated_keys".to_string(),
                    json!(map.len() - limits.max_items),
                );
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Object(_) => "object",
        Value::Array(_) => "array",
        Value::String(_) => "string",
        Value::Number(_) => "number",
        Value::Bool(_) => "boolean",
        Value::Null => "null",
    }
}

/// Truncate a string to at most `max_chars` characters, appending an
/// ellipsis only when the string was actually cut.
#[must_use]
pub fn truncate_text(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push('\u{2026}');
    out
}

/// Render `value` as a JSON preview with recursively sorted object keys and
/// stable two-space indentation, then truncate to `max_chars`.
#[must_use]
pub fn safe_json_preview(value: &Value, max_chars: usize) -> String {
    let sorted = sort_keys(value);
    let rendered = serde_json::to_string_pretty(&sorted).unwrap_or_default();
    truncate_text(&rendered, max_chars)
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            let mut out = Map::new();
            for (k, v) in entries {
                out.insert(k.clone(), sort_keys(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strings_are_truncated_with_ellipsis() {
        let limits = TruncateLimits {
            max_depth: 5,
            max_items: 12,
            max_text: 4,
        };
        let v = truncate_with(&json!("hello world"), limits);
        assert_eq!(v, json!("hell\u{2026}"));
    }

    #[test]
    fn short_strings_are_untouched() {
        let v = deep_truncate(&json!("short"));
        assert_eq!(v, json!("short"));
    }

    #[test]
    fn arrays_beyond_max_items_append_marker() {
        let limits = TruncateLimits {
            max_depth: 5,
            max_items: 2,
            max_text: 4000,
        };
        let v = truncate_with(&json!([1, 2, 3, 4]), limits);
        assert_eq!(v, json!([1, 2, { "_truncated_items": 2 }]));
    }

    #[test]
    fn objects_beyond_max_items_append_marker() {
        let limits = TruncateLimits {
            max_depth: 5,
            max_items: 1,
            max_text: 4000,
        };
        let v = truncate_with(&json!({"a": 1, "b": 2}), limits);
        let obj = v.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert_eq!(obj.get("_truncated_keys"), Some(&json!(1)));
    }

    #[test]
    fn depth_limit_collapses_containers() {
        let limits = TruncateLimits {
            max_depth: 1,
            max_items: 12,
            max_text: 4000,
        };
        let v = truncate_with(&json!({"a": {"b": {"c": 1}}}), limits);
        let inner = &v["a"];
        assert_eq!(inner["_truncated"], json!(true));
        assert_eq!(inner["_type"], json!("object"));
    }

    #[test]
    fn deep_truncate_is_idempotent_up_to_markers() {
        let v = json!({"a": (0..20).collect::<Vec<_>>(), "b": "x".repeat(5000)});
        let once = deep_truncate(&v);
        let twice = deep_truncate(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn preview_sorts_keys_and_truncates() {
        let v = json!({"b": 1, "a": 2});
        let preview = safe_json_preview(&v, 1000);
        let a_pos = preview.find("\"a\"").unwrap();
        let b_pos = preview.find("\"b\"").unwrap();
        assert!(a_pos < b_pos);

        let short = safe_json_preview(&v, 3);
        assert!(short.chars().count() <= 4);
    }
}
