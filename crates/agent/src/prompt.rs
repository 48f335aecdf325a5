//! Per-turn prompt payload construction (`spec.md` §4.6 step 1-2).

use serde_json::{json, Map, Value};
use wre_value::{deep_truncate, safe_json_preview, truncate_text};
use wre_tools::ToolSpec;

const WORKFLOW_TEXT_MAX_CHARS: usize = 2000;

/// One entry of the tool catalog as projected down for the prompt:
/// `{name, description, required_args, args[name -> {type, description,
/// enum}], limitations}`.
#[must_use]
pub fn project_tool_catalog(specs: &[ToolSpec]) -> Vec<Value> {
    specs
        .iter()
        .map(|spec| {
            let schema = &spec.input_schema;
            let properties = schema.get("properties").and_then(Value::as_object);
            let required: Vec<String> = schema
                .get("required")
                .and_then(Value::as_array)
                .map(|r| {
                    r.iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default();

            let mut args = Map::new();
            if let Some(props) = properties {
                for (name, prop) in props {
                    args.insert(
                        name.clone(),
                        json!({
                            "type": prop.get("type").cloned().unwrap_or(Value::Null),
                            "description": prop.get("description").cloned().unwrap_or(Value::Null),
                            "enum": prop.get("enum").cloned().unwrap_or(Value::Null),
                        }),
                    );
                }
            }

            json!({
                "name": spec.name,
                "description": spec.description,
                "required_args": required,
                "args": args,
                "limitations": spec.limitations,
            })
        })
        .collect()
}

/// Build the full per-turn prompt payload. The caller serializes this via
/// [`wre_value::safe_json_preview`] before embedding it in the user message.
#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn build_prompt_payload(
    workflow_prompt: &str,
    workflow_summary: &str,
    node_metadata: &Value,
    run_inputs: &Value,
    upstream_handoffs: &[Value],
    tool_catalog: &[Value],
    workspace_root: &str,
    turn_history: &[Value],
    max_turns: u32,
    current_turn: u32,
) -> Value {
    let prefer_final_when_enough_context = current_turn + 1 >= max_turns;

    json!({
        "workflow": {
            "prompt": truncate_text(workflow_prompt, WORKFLOW_TEXT_MAX_CHARS),
            "summary": truncate_text(workflow_summary, WORKFLOW_TEXT_MAX_CHARS),
        },
        "node": node_metadata,
        "runInputs": deep_truncate(run_inputs),
        "upstreamHandoffs": upstream_handoffs.iter().map(deep_truncate).collect::<Vec<_>>(),
        "toolCatalog": tool_catalog,
        "workspace": { "root": workspace_root },
        "history": turn_history,
        "constraints": {
            "maxTurns": max_turns,
            "currentTurn": current_turn,
            "preferFinalWhenEnoughContext": prefer_final_when_enough_context,
        },
    })
}

/// Render a prompt payload to the bounded text embedded in the user
/// message, per the original runtime's `max_chars=18000` cap.
#[must_use]
pub fn render_payload(payload: &Value) -> String {
    safe_json_preview(payload, 18_000)
}

/// Fixed system prompt: deliverable-contract instructions and
/// workspace-usage guidance, shared by every node.
#[must_use]
pub fn system_prompt() -> &'static str {
    "You are one agent node in a multi-node workflow. Each turn you must \
     respond with a single JSON object matching the decision schema you \
     are given — no prose outside the JSON. Choose action \"tool\" to \
     invoke exactly one tool from the provided catalog, or action \"final\" \
     once you have enough information to produce your node's output. \
     When you emit a final decision for a sink node, and the run asked for \
     any deliverable whose name suggests a code bundle (contains \"code\", \
     \"app\", \"bundle\", \"source\", or \"repo\"), you must include that \
     deliverable under data.deliverables as an object with a `files` map \
     of relative path to file contents. Use the workspace tools to read \
     prior artifacts and upstream uploads before asking the user for \
     information that is already on disk; prefer citing upstream handoff \
     payloads over repeating tool calls you have already made this turn \
     sequence."
}

/// Decision schema text embedded alongside the payload, capped per the
/// original runtime's `max_chars=12000`.
#[must_use]
pub fn decision_schema_text() -> String {
    let schema = json!({
        "type": "object",
        "required": ["action"],
        "properties": {
            "action": {"type": "string", "enum": ["tool", "final"]},
            "status_note": {"type": "string"},
            "summary": {"type": "string"},
            "details": {"type": "object"},
            "data": {"type": "object"},
            "tool_request": {
                "type": "object",
                "properties": {
                    "tool": {"type": "string"},
                    "args": {"type": "object"},
                },
                "required": ["tool"],
            },
        },
    });
    safe_json_preview(&schema, 12_000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projects_tool_catalog_from_json_schema() {
        let specs = vec![ToolSpec {
            name: "web_search",
            description: "search the web",
            input_schema: json!({
                "type": "object",
                "properties": {"query": {"type": "string", "description": "the query"}},
                "required": ["query"],
            }),
            limitations: "none",
        }];
        let projected = project_tool_catalog(&specs);
        assert_eq!(projected[0]["name"], json!("web_search"));
        assert_eq!(projected[0]["required_args"], json!(["query"]));
        assert_eq!(projected[0]["args"]["query"]["type"], json!("string"));
    }

    #[test]
    fn prefers_final_on_last_turn() {
        let payload = build_prompt_payload(
            "p", "s", &json!({}), &json!({}), &[], &[], "/ws", &[], 5, 4,
        );
        assert_eq!(payload["constraints"]["preferFinalWhenEnoughContext"], json!(true));
    }
}
