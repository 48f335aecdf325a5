//! The per-node agent decision loop itself (`spec.md` §4.6).
//!
//! [`run_node_decision_loop`] is the total entry point C7 (the scheduler)
//! calls once per node, after releasing its run mutex, with an immutable
//! snapshot of everything the node needs.

use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use wre_handoff::{HandoffPacket, NodeOutput, WorkspaceRef};
use wre_tools::{derive_workspace_refs, ToolContext, ToolRegistry};
use wre_value::deep_truncate;
use wre_workflow::Node;

use crate::client::AgentDecisionClient;
use crate::decision::{parse_agent_decision, AgentDecision, DecisionAction};
use crate::error::AgentError;
use crate::prompt::{
    build_prompt_payload, decision_schema_text, project_tool_catalog, render_payload,
    system_prompt,
};
use crate::repetition::{RepetitionSignal, RepetitionTracker};
use crate::trace::TraceEvent;

/// Maximum number of merged workspace refs carried on a node's final output.
const MAX_WORKSPACE_REFS: usize = 120;
/// Substrings that mark a requested deliverable name as a code bundle
/// (`spec.md` §4.6 "Final branch").
const CODE_BUNDLE_MARKERS: [&str; 5] = ["code", "app", "bundle", "source", "repo"];
/// Cap on how much of a malformed reply is quoted back in the one corrective retry.
const MALFORMED_REPLY_QUOTE_CHARS: usize = 4000;

/// One upstream edge's materialized input: the typed handoff packet plus
/// the raw source-node output it was derived from (both sanitized before
/// use in the prompt).
#[derive(Debug, Clone)]
pub struct UpstreamInput {
    pub packet: HandoffPacket,
    pub source_output: NodeOutput,
}

/// Everything [`run_node_decision_loop`] needs, built by the scheduler from
/// an immutable run snapshot.
pub struct DecisionLoopInput<'a> {
    pub workflow_prompt: &'a str,
    pub workflow_summary: &'a str,
    pub node: &'a Node,
    pub upstream_inputs: &'a [UpstreamInput],
    pub run_inputs: &'a Value,
    pub tool_registry: &'a ToolRegistry,
    pub tool_context: &'a ToolContext,
    pub decision_client: &'a dyn AgentDecisionClient,
    pub cancellation: &'a CancellationToken,
    pub max_turns: u32,
    pub is_sink: bool,
    pub requested_deliverables: &'a [String],
    pub workspace_root: &'a str,
}

/// A successfully produced node output plus the full ordered trace of the
/// turns that led to it.
pub struct NodeOutcome {
    pub output: NodeOutput,
    pub trace: Vec<TraceEvent>,
}

/// The callback the scheduler passes so subscribers see turns as they
/// happen, independent of the `trace` vector returned at the end
/// (`spec.md` §4.6 "Live logging").
pub type LiveLogCallback<'a> = dyn Fn(&TraceEvent) + Send + Sync + 'a;

/// Run the full per-node decision loop to completion.
///
/// # Errors
/// Returns [`AgentError`] when the decision client fails, the model's
/// reply cannot be parsed after one retry, the turn budget is exhausted
/// without a valid final decision, or a sink node's output is still
/// missing a required code-bundle deliverable on the last permitted turn.
pub async fn run_node_decision_loop(
    input: DecisionLoopInput<'_>,
    live_log: &LiveLogCallback<'_>,
) -> Result<NodeOutcome, AgentError> {
    let max_turns = input.max_turns.max(1);
    let tool_catalog = project_tool_catalog(&input.tool_registry.list_tools());
    let upstream_json = build_upstream_handoffs_json(input.upstream_inputs);
    let node_metadata = json!({
        "id": input.node.id,
        "name": input.node.name,
        "role": input.node.role,
        "objective": input.node.objective,
    });
    let system = system_prompt();
    let schema_text = decision_schema_text();

    let mut history: Vec<Value> = Vec::new();
    let mut trace: Vec<TraceEvent> = Vec::new();
    let mut repetition = RepetitionTracker::new();
    let mut tool_derived_refs: Vec<WorkspaceRef> = Vec::new();
    let mut tool_call_count: u32 = 0;

    for turn in 0..max_turns {
        emit(&mut trace, live_log, TraceEvent::Thinking { turn });

        let payload = build_prompt_payload(
            input.workflow_prompt,
            input.workflow_summary,
            &node_metadata,
            input.run_inputs,
            &upstream_json,
            &tool_catalog,
            input.workspace_root,
            &history,
            max_turns,
            turn,
        );
        let user_text = render_payload(&payload);

        let decision = decide_with_retry(
            input.decision_client,
            system,
            &user_text,
            &schema_text,
            input.cancellation,
            turn,
            &mut trace,
            live_log,
        )
        .await?;

        match decision.action {
            DecisionAction::Tool => {
                let Some(tool_request) = decision.tool_request else {
                    history.push(json!({
                        "turn": turn,
                        "action": "tool_error",
                        "error": "action was \"tool\" but no tool_request was supplied",
                    }));
                    continue;
                };

                if repetition.breaker_tripped() {
                    history.push(json!({
                        "turn": turn,
                        "action": "tool_call_blocked",
                        "tool": tool_request.tool,
                        "note": "circuit breaker is tripped; no further tool calls are permitted, emit action=final now",
                    }));
                    continue;
                }

                if !input.tool_registry.has_tool(&tool_request.tool) {
                    history.push(json!({
                        "turn": turn,
                        "action": "tool_error",
                        "tool": tool_request.tool,
                        "error": format!("unknown tool '{}'", tool_request.tool),
                    }));
                    continue;
                }

                let signal = repetition.observe(&tool_request.tool, &tool_request.args);

                match input
                    .tool_registry
                    .run_tool(&tool_request.tool, tool_request.args.clone(), input.tool_context)
                    .await
                {
                    Ok(result) => {
                        tool_call_count += 1;
                        let refs = derive_workspace_refs(
                            &tool_request.tool,
                            &tool_request.args,
                            &result.result,
                        );
                        tool_derived_refs.extend(refs.iter().cloned());
                        let refs_json = serde_json::to_value(&refs).unwrap_or(json!([]));

                        history.push(json!({
                            "turn": turn,
                            "action": "tool_result",
                            "tool": tool_request.tool,
                            "args": deep_truncate(&tool_request.args),
                            "result": deep_truncate(&result.result),
                        }));
                        emit(
                            &mut trace,
                            live_log,
                            TraceEvent::ToolCompleted {
                                turn,
                                tool: tool_request.tool.clone(),
                                args: tool_request.args.clone(),
                                duration_ms: result.duration_ms,
                                workspace_refs: refs_json,
                            },
                        );
                    }
                    Err(err) => {
                        history.push(json!({
                            "turn": turn,
                            "action": "tool_error",
                            "tool": tool_request.tool,
                            "error": err.to_string(),
                        }));
                        emit(
                            &mut trace,
                            live_log,
                            TraceEvent::ToolFailed {
                                turn,
                                tool: tool_request.tool.clone(),
                                error: err.to_string(),
                            },
                        );
                    }
                }

                match signal {
                    RepetitionSignal::Warning => {
                        history.push(json!({
                            "turn": turn,
                            "action": "repetition_warning",
                            "note": "you have called the same tool with identical arguments repeatedly; rely on the upstream handoffs and run inputs already provided instead of repeating this call",
                        }));
                        emit(
                            &mut trace,
                            live_log,
                            TraceEvent::RepetitionWarning {
                                turn,
                                tool: tool_request.tool.clone(),
                            },
                        );
                    }
                    RepetitionSignal::Breaker => {
                        history.push(json!({
                            "turn": turn,
                            "action": "circuit_breaker",
                            "note": "further tool calls are forbidden; you must respond with action=final next",
                        }));
                        emit(
                            &mut trace,
                            live_log,
                            TraceEvent::CircuitBreaker {
                                turn,
                                tool: tool_request.tool.clone(),
                            },
                        );
                    }
                    RepetitionSignal::None => {}
                }
            }
            DecisionAction::Final => {
                if input.is_sink {
                    let required = required_code_bundle_names(input.requested_deliverables);
                    let missing = missing_code_bundles(&required, &decision.data);
                    if !missing.is_empty() {
                        let is_last_turn = turn + 1 >= max_turns;
                        if is_last_turn {
                            return Err(AgentError::MissingCodeBundleDeliverables(
                                missing.join(", "),
                            ));
                        }
                        history.push(json!({
                            "turn": turn,
                            "action": "validation_retry",
                            "note": format!(
                                "Sink node output missing required code bundle deliverables: {}",
                                missing.join(", ")
                            ),
                        }));
                        emit(
                            &mut trace,
                            live_log,
                            TraceEvent::ValidationRetry { turn, missing },
                        );
                        continue;
                    }
                }

                let output = build_final_output(
                    input.node,
                    &decision,
                    &tool_derived_refs,
                    tool_call_count,
                    turn,
                    &history,
                );
                emit(
                    &mut trace,
                    live_log,
                    TraceEvent::Final {
                        turn,
                        summary: output.summary.clone(),
                    },
                );
                return Ok(NodeOutcome { output, trace });
            }
        }
    }

    Err(AgentError::TurnBudgetExhausted {
        node: input.node.id.clone(),
        max_turns,
    })
}

fn emit(trace: &mut Vec<TraceEvent>, live_log: &LiveLogCallback<'_>, event: TraceEvent) {
    live_log(&event);
    trace.push(event);
}

/// Call the decision client, parse the reply, and perform the single
/// allowed corrective retry on a malformed reply (`spec.md` §4.6 step 3).
async fn decide_with_retry(
    client: &dyn AgentDecisionClient,
    system: &str,
    user_text: &str,
    schema_text: &str,
    cancellation: &CancellationToken,
    turn: u32,
    trace: &mut Vec<TraceEvent>,
    live_log: &LiveLogCallback<'_>,
) -> Result<AgentDecision, AgentError> {
    let raw = client.decide(system, user_text, schema_text, cancellation).await?;

    match parse_agent_decision(&raw) {
        Ok(decision) => Ok(decision),
        Err(reason) => {
            emit(
                trace,
                live_log,
                TraceEvent::MalformedReplyRetry {
                    turn,
                    reason: reason.clone(),
                },
            );
            let quoted = truncate_chars(&raw, MALFORMED_REPLY_QUOTE_CHARS);
            let corrective = format!(
                "{user_text}\n\nYour previous reply could not be parsed as the required JSON \
                 object ({reason}). Your previous reply was:\n{quoted}\n\nRespond again with \
                 only a single valid JSON object matching the decision schema."
            );
            let retry_raw = client.decide(system, &corrective, schema_text, cancellation).await?;
            parse_agent_decision(&retry_raw).map_err(AgentError::MalformedReply)
        }
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

fn build_upstream_handoffs_json(upstream: &[UpstreamInput]) -> Vec<Value> {
    upstream
        .iter()
        .map(|u| {
            json!({
                "packet": serde_json::to_value(&u.packet).unwrap_or(Value::Null),
                "sourceOutput": serde_json::to_value(&u.source_output).unwrap_or(Value::Null),
            })
        })
        .collect()
}

/// Requested deliverable names containing a code-bundle marker, case
/// insensitively.
fn required_code_bundle_names(requested: &[String]) -> Vec<String> {
    requested
        .iter()
        .filter(|name| {
            let lower = name.to_ascii_lowercase();
            CODE_BUNDLE_MARKERS.iter().any(|m| lower.contains(m))
        })
        .cloned()
        .collect()
}

/// Names in `required` whose `data.deliverables[name]` is absent or does
/// not extract as a code bundle (`{files: {relativePath: string}}`).
fn missing_code_bundles(required: &[String], data: &Map<String, Value>) -> Vec<String> {
    if required.is_empty() {
        return Vec::new();
    }
    let deliverables = data.get("deliverables").and_then(Value::as_object);
    required
        .iter()
        .filter(|name| {
            let Some(deliverables) = deliverables else {
                return true;
            };
            let Some(entry) = deliverables.get(*name) else {
                return true;
            };
            !is_code_bundle(entry)
        })
        .cloned()
        .collect()
}

fn is_code_bundle(value: &Value) -> bool {
    value
        .get("files")
        .and_then(Value::as_object)
        .is_some_and(|files| {
            !files.is_empty() && files.values().all(Value::is_string)
        })
}

/// Extract the `tool_result`/`tool_error` entries from the turn history, in
/// order, for `details.toolCalls` (`spec.md` §4.6 "Final branch").
fn collect_tool_calls(history: &[Value]) -> Vec<Value> {
    history
        .iter()
        .filter(|entry| {
            matches!(
                entry.get("action").and_then(Value::as_str),
                Some("tool_result" | "tool_error")
            )
        })
        .cloned()
        .collect()
}

/// Merge auto-derived workspace refs from tool history with model-supplied
/// `data.workspaceRefs`, deduping by `path|operation|kind|sourceTool` and
/// capping at [`MAX_WORKSPACE_REFS`] (`spec.md` §4.6 "Final branch").
fn merge_workspace_refs(auto: &[WorkspaceRef], model_supplied: &Value) -> Vec<WorkspaceRef> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();

    let model_refs: Vec<WorkspaceRef> = model_supplied
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|v| serde_json::from_value::<WorkspaceRef>(v.clone()).ok())
                .collect()
        })
        .unwrap_or_default();

    for r in auto.iter().chain(model_refs.iter()) {
        let key = r.dedup_key();
        if seen.insert(key) {
            out.push(r.clone());
        }
        if out.len() >= MAX_WORKSPACE_REFS {
            break;
        }
    }
    out
}

fn build_final_output(
    node: &Node,
    decision: &AgentDecision,
    tool_derived_refs: &[WorkspaceRef],
    tool_call_count: u32,
    turn: u32,
    history: &[Value],
) -> NodeOutput {
    let model_refs = decision
        .data
        .get("workspaceRefs")
        .cloned()
        .unwrap_or(Value::Array(vec![]));
    let merged_refs = merge_workspace_refs(tool_derived_refs, &model_refs);
    let merged_refs_json = serde_json::to_value(&merged_refs).unwrap_or(json!([]));
    let tool_calls = deep_truncate(&Value::Array(collect_tool_calls(history)));

    let summary = if decision.summary.trim().is_empty() {
        format!("{} completed its objective.", node.name)
    } else {
        decision.summary.clone()
    };

    let mut details = decision.details.clone();
    details.insert("nodeId".to_string(), json!(node.id));
    details.insert("nodeName".to_string(), json!(node.name));
    details.insert("role".to_string(), json!(node.role));
    details.insert("objective".to_string(), json!(node.objective));
    details.insert("toolCalls".to_string(), tool_calls);
    details.insert("workspaceRefs".to_string(), merged_refs_json.clone());
    details.insert(
        "agentDetails".to_string(),
        Value::Object(decision.details.clone()),
    );
    details.insert("stepCount".to_string(), json!(turn + 1));

    let mut data = decision.data.clone();
    data.insert("summary".to_string(), json!(summary.clone()));
    data.insert("nodeId".to_string(), json!(node.id));
    data.insert("nodeName".to_string(), json!(node.name));
    data.insert("toolCallCount".to_string(), json!(tool_call_count));
    data.insert("workspaceRefs".to_string(), merged_refs_json);

    NodeOutput {
        summary,
        details,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_names_match_any_marker_case_insensitively() {
        let requested = vec![
            "report.md".to_string(),
            "Final_Code_Bundle.zip".to_string(),
            "the-app".to_string(),
        ];
        let required = required_code_bundle_names(&requested);
        assert_eq!(required, vec!["Final_Code_Bundle.zip", "the-app"]);
    }

    #[test]
    fn missing_when_deliverable_absent() {
        let data = Map::new();
        let missing = missing_code_bundles(&["app.zip".to_string()], &data);
        assert_eq!(missing, vec!["app.zip"]);
    }

    #[test]
    fn missing_when_not_a_bundle() {
        let mut data = Map::new();
        let mut deliverables = Map::new();
        deliverables.insert("app.zip".to_string(), json!("not a bundle"));
        data.insert("deliverables".to_string(), Value::Object(deliverables));
        let missing = missing_code_bundles(&["app.zip".to_string()], &data);
        assert_eq!(missing, vec!["app.zip"]);
    }

    #[test]
    fn present_when_bundle_shaped() {
        let mut data = Map::new();
        let mut deliverables = Map::new();
        deliverables.insert(
            "app.zip".to_string(),
            json!({"files": {"main.go": "package main"}}),
        );
        data.insert("deliverables".to_string(), Value::Object(deliverables));
        let missing = missing_code_bundles(&["app.zip".to_string()], &data);
        assert!(missing.is_empty());
    }

    #[test]
    fn non_sink_deliverables_never_validated() {
        // required_code_bundle_names is only consulted when `is_sink` is
        // true at the call site; this test just pins the pure helper's
        // behavior against an empty `required` list.
        let data = Map::new();
        assert!(missing_code_bundles(&[], &data).is_empty());
    }

    #[test]
    fn merge_dedups_and_prefers_order_auto_then_model() {
        let auto = vec![WorkspaceRef {
            path: "a.txt".to_string(),
            kind: None,
            role: None,
            operation: Some("write".to_string()),
            source_tool: Some("workspace_write_file".to_string()),
            status: None,
            note: None,
            purpose: None,
            cwd: None,
            size_bytes: None,
            file_count: None,
        }];
        let model_supplied = json!([
            {"path": "a.txt", "operation": "write", "sourceTool": "workspace_write_file"},
            {"path": "b.txt", "operation": "read"},
        ]);
        let merged = merge_workspace_refs(&auto, &model_supplied);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].path, "a.txt");
        assert_eq!(merged[1].path, "b.txt");
    }

    #[test]
    fn collect_tool_calls_keeps_only_tool_result_and_error_entries() {
        let history = vec![
            json!({"turn": 0, "action": "tool_result", "tool": "workspace_list_files"}),
            json!({"turn": 1, "action": "repetition_warning"}),
            json!({"turn": 2, "action": "tool_error", "tool": "sandbox_exec", "error": "timed out"}),
            json!({"turn": 3, "action": "circuit_breaker"}),
        ];
        let calls = collect_tool_calls(&history);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0]["tool"], "workspace_list_files");
        assert_eq!(calls[1]["tool"], "sandbox_exec");
    }
}
