//! The structured reply the `AgentDecisionClient` produces each turn, and
//! its lenient parser (`spec.md` §4.6 step 3).

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What the model chose to do this turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    Tool,
    Final,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolRequest {
    pub tool: String,
    #[serde(default)]
    pub args: Value,
}

/// One structured reply from the `AgentDecisionClient`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentDecision {
    pub action: DecisionAction,
    #[serde(default)]
    pub status_note: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub details: Map<String, Value>,
    #[serde(default)]
    pub data: Map<String, Value>,
    #[serde(default)]
    pub tool_request: Option<ToolRequest>,
}

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*\})\s*```").unwrap());

/// Parse a raw model reply into an [`AgentDecision`], accepting:
/// bare JSON; JSON wrapped in a ` ```json … ``` ` fence; multiple
/// back-to-back JSON objects (the last one wins); or an object embedded in
/// surrounding noise (sliced from the first `{` to the last `}`).
///
/// # Errors
/// Returns a human-readable message (the caller wraps it in
/// [`crate::error::AgentError::MalformedReply`]) when no parse strategy
/// yields a JSON object, or the object doesn't match [`AgentDecision`]'s
/// shape.
pub fn parse_agent_decision(raw_text: &str) -> Result<AgentDecision, String> {
    let object = parse_json_object(raw_text)?;
    serde_json::from_value(object).map_err(|e| format!("decision did not match expected shape: {e}"))
}

fn parse_json_object(raw_text: &str) -> Result<Value, String> {
    let trimmed = raw_text.trim();
    if trimmed.is_empty() {
        return Err("empty reply".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if value.is_object() {
            return Ok(value);
        }
    }

    if let Some(caps) = FENCE_RE.captures(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(&caps[1]) {
            if value.is_object() {
                return Ok(value);
            }
        }
    }

    if let Some(value) = last_of_back_to_back_objects(trimmed) {
        return Ok(value);
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if end > start {
            if let Ok(value) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
                if value.is_object() {
                    return Ok(value);
                }
            }
        }
    }

    Err("reply did not contain a parseable JSON object".to_string())
}

/// Stream-parse `text` for consecutive top-level JSON values, keeping only
/// the last one that is an object.
fn last_of_back_to_back_objects(text: &str) -> Option<Value> {
    let stream = serde_json::Deserializer::from_str(text).into_iter::<Value>();
    let mut last_object = None;
    for item in stream {
        match item {
            Ok(value) if value.is_object() => last_object = Some(value),
            Ok(_) => {}
            Err(_) => break,
        }
    }
    last_object
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_json() {
        let raw = r#"{"action": "final", "summary": "done"}"#;
        let decision = parse_agent_decision(raw).unwrap();
        assert_eq!(decision.action, DecisionAction::Final);
        assert_eq!(decision.summary, "done");
    }

    #[test]
    fn parses_fenced_json() {
        let raw = "Here is my answer:\n```json\n{\"action\": \"final\", \"summary\": \"ok\"}\n```\nThanks.";
        let decision = parse_agent_decision(raw).unwrap();
        assert_eq!(decision.summary, "ok");
    }

    #[test]
    fn last_of_multiple_objects_wins() {
        let raw = r#"{"action": "tool", "summary": "first"} {"action": "final", "summary": "second"}"#;
        let decision = parse_agent_decision(raw).unwrap();
        assert_eq!(decision.action, DecisionAction::Final);
        assert_eq!(decision.summary, "second");
    }

    #[test]
    fn slices_object_out_of_noise() {
        let raw = "Sure, here's the decision: {\"action\": \"final\", \"summary\": \"ok\"} — hope that helps!";
        let decision = parse_agent_decision(raw).unwrap();
        assert_eq!(decision.summary, "ok");
    }

    #[test]
    fn rejects_empty_reply() {
        assert!(parse_agent_decision("   ").is_err());
    }

    #[test]
    fn rejects_non_object_json() {
        assert!(parse_agent_decision("[1, 2, 3]").is_err());
    }

    #[test]
    fn tool_request_parses_when_present() {
        let raw = r#"{"action": "tool", "tool_request": {"tool": "web_search", "args": {"query": "x"}}}"#;
        let decision = parse_agent_decision(raw).unwrap();
        let req = decision.tool_request.unwrap();
        assert_eq!(req.tool, "web_search");
    }
}
