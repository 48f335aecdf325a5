//! Total, deterministic coercion of a resolved JSON value to a contract
//! field's declared type (`spec.md` §4.4 step 3).

use serde_json::{Map, Value};
use wre_workflow::FieldType;

/// Coerce `value` to `field_type`. Total: every input produces *some*
/// output, never an error. A `Value::Null` input coerces to `Value::Null`
/// under every target type.
#[must_use]
pub fn coerce_handoff_value(value: &Value, field_type: FieldType) -> Value {
    if value.is_null() {
        return Value::Null;
    }

    match field_type {
        FieldType::Any | FieldType::Json => value.clone(),
        FieldType::String => coerce_string(value),
        FieldType::Number => coerce_number(value),
        FieldType::Boolean => coerce_boolean(value),
        FieldType::Array => coerce_array(value),
        FieldType::Object => coerce_object(value),
    }
}

fn coerce_string(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.clone()),
        Value::Bool(b) => Value::String(b.to_string()),
        Value::Number(n) => Value::String(n.to_string()),
        other => Value::String(other.to_string()),
    }
}

fn coerce_number(value: &Value) -> Value {
    match value {
        Value::Number(n) => Value::Number(n.clone()),
        Value::Bool(b) => Value::Number(serde_json::Number::from(u64::from(*b))),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.contains('.') {
                trimmed
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map_or(Value::Null, Value::Number)
            } else {
                trimmed
                    .parse::<i64>()
                    .ok()
                    .map_or(Value::Null, |n| Value::Number(n.into()))
            }
        }
        _ => Value::Null,
    }
}

fn coerce_boolean(value: &Value) -> Value {
    match value {
        Value::Bool(b) => Value::Bool(*b),
        Value::Number(n) => Value::Bool(n.as_f64().is_some_and(|f| f != 0.0)),
        Value::String(s) => {
            let lowered = s.trim().to_ascii_lowercase();
            match lowered.as_str() {
                "true" | "1" | "yes" | "y" => Value::Bool(true),
                "false" | "0" | "no" | "n" => Value::Bool(false),
                _ => Value::Null,
            }
        }
        _ => Value::Null,
    }
}

fn coerce_array(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.clone()),
        other => Value::Array(vec![other.clone()]),
    }
}

fn coerce_object(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(map.clone()),
        other => {
            let mut wrapped = Map::new();
            wrapped.insert("value".to_string(), other.clone());
            Value::Object(wrapped)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_passes_through_every_type() {
        for ty in [
            FieldType::String,
            FieldType::Number,
            FieldType::Boolean,
            FieldType::Array,
            FieldType::Object,
            FieldType::Any,
            FieldType::Json,
        ] {
            assert_eq!(coerce_handoff_value(&Value::Null, ty), Value::Null);
        }
    }

    #[test]
    fn number_coercion_rules() {
        assert_eq!(coerce_handoff_value(&json!(true), FieldType::Number), json!(1));
        assert_eq!(coerce_handoff_value(&json!(false), FieldType::Number), json!(0));
        assert_eq!(
            coerce_handoff_value(&json!("42"), FieldType::Number),
            json!(42)
        );
        assert_eq!(
            coerce_handoff_value(&json!("4.5"), FieldType::Number),
            json!(4.5)
        );
        assert_eq!(
            coerce_handoff_value(&json!("nope"), FieldType::Number),
            Value::Null
        );
    }

    #[test]
    fn boolean_coercion_recognizes_word_forms() {
        for truthy in ["true", "1", "yes", "y", "TRUE", "Y"] {
            assert_eq!(
                coerce_handoff_value(&json!(truthy), FieldType::Boolean),
                json!(true)
            );
        }
        for falsy in ["false", "0", "no", "n"] {
            assert_eq!(
                coerce_handoff_value(&json!(falsy), FieldType::Boolean),
                json!(false)
            );
        }
        assert_eq!(
            coerce_handoff_value(&json!("maybe"), FieldType::Boolean),
            Value::Null
        );
    }

    #[test]
    fn array_wraps_non_lists() {
        assert_eq!(
            coerce_handoff_value(&json!("x"), FieldType::Array),
            json!(["x"])
        );
        assert_eq!(
            coerce_handoff_value(&json!([1, 2]), FieldType::Array),
            json!([1, 2])
        );
    }

    #[test]
    fn object_wraps_non_mappings() {
        assert_eq!(
            coerce_handoff_value(&json!(5), FieldType::Object),
            json!({"value": 5})
        );
        assert_eq!(
            coerce_handoff_value(&json!({"a": 1}), FieldType::Object),
            json!({"a": 1})
        );
    }

    #[test]
    fn any_and_json_deep_copy() {
        let v = json!({"nested": [1, 2, {"a": true}]});
        assert_eq!(coerce_handoff_value(&v, FieldType::Any), v);
        assert_eq!(coerce_handoff_value(&v, FieldType::Json), v);
    }
}
