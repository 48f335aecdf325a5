//! Dotted-path navigation used to resolve a [`crate::model::HandoffField`]'s
//! `sourcePath` against a source node's output.

use serde_json::Value;

/// Resolve `source_path` against `data`, returning whether the path was
/// found along with the resolved value (`Value::Null` when not found).
///
/// `.`, `$`, and the bare literal `output` all mean "the whole value". A
/// leading `output.` prefix is stripped before navigation (contracts are
/// authored against an `output.foo.bar` mental model even though the
/// broker hands navigation the output directly). Segments are split on
/// `.`; a segment that parses as an integer indexes into an array.
#[must_use]
pub fn json_path_get(data: &Value, source_path: &str) -> (bool, Value) {
    let trimmed = source_path.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == "$" || trimmed == "output" {
        return (true, data.clone());
    }

    let path = trimmed.strip_prefix("output.").unwrap_or(trimmed);
    if path.is_empty() {
        return (true, data.clone());
    }

    let mut current = data;
    for segment in path.split('.') {
        if segment.is_empty() {
            continue;
        }
        match current {
            Value::Object(map) => {
                let Some(next) = map.get(segment) else {
                    return (false, Value::Null);
                };
                current = next;
            }
            Value::Array(items) => {
                let Ok(idx) = segment.parse::<usize>() else {
                    return (false, Value::Null);
                };
                let Some(next) = items.get(idx) else {
                    return (false, Value::Null);
                };
                current = next;
            }
            _ => return (false, Value::Null),
        }
    }
    (true, current.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dot_and_dollar_and_output_mean_whole_value() {
        let data = json!({"a": 1});
        assert_eq!(json_path_get(&data, "."), (true, data.clone()));
        assert_eq!(json_path_get(&data, "$"), (true, data.clone()));
        assert_eq!(json_path_get(&data, "output"), (true, data.clone()));
    }

    #[test]
    fn output_prefix_is_stripped() {
        let data = json!({"summary": "hi"});
        assert_eq!(
            json_path_get(&data, "output.summary"),
            (true, json!("hi"))
        );
        assert_eq!(json_path_get(&data, "summary"), (true, json!("hi")));
    }

    #[test]
    fn nested_object_navigation() {
        let data = json!({"details": {"count": 3}});
        assert_eq!(
            json_path_get(&data, "details.count"),
            (true, json!(3))
        );
    }

    #[test]
    fn array_index_navigation() {
        let data = json!({"items": ["a", "b"]});
        assert_eq!(
            json_path_get(&data, "items.1"),
            (true, json!("b"))
        );
    }

    #[test]
    fn missing_path_is_not_found() {
        let data = json!({"a": 1});
        assert_eq!(json_path_get(&data, "b.c"), (false, Value::Null));
    }
}
