//! The per-run scheduler worker (`spec.md` §4.7).
//!
//! One [`run_worker`] is spawned per admitted run. It iterates the run's
//! topological node order, releasing the run mutex around every call into
//! the agent decision loop (C6) the way `spec.md` §5 requires of every
//! long-latency operation.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::broadcast;
use wre_agent::decision_loop::UpstreamInput;
use wre_agent::{run_node_decision_loop, DecisionLoopInput, TraceEvent};
use wre_core::time::now_iso;
use wre_eventlog::{synthesize_workspace_changes, Event, EventCategory, StreamEvent};
use wre_handoff::build_handoff_packet;
use wre_tools::ToolContext;

use crate::finalize::{finalize_cancelled, finalize_success};
use crate::model::{Run, RunStatus};
use crate::registry::{RunRecord, SchedulerDeps};
use crate::timing::duration_ms_between;

/// Drive `record`'s run to a terminal state.
pub async fn run_worker(record: Arc<RunRecord>, deps: Arc<SchedulerDeps>) {
    if !admit(&record) {
        return;
    }

    let node_ids: Vec<String> = record.run.lock().graph.order.clone();

    for node_id in node_ids {
        if observe_cancellation(&record) {
            return;
        }

        let prepared = prepare_node(&record, &node_id);
        let record_for_log = record.clone();
        let node_id_for_log = node_id.clone();
        let live_log = move |event: &TraceEvent| {
            log_trace_event(&record_for_log, &node_id_for_log, event);
        };

        let input = DecisionLoopInput {
            workflow_prompt: &prepared.workflow_prompt,
            workflow_summary: &prepared.workflow_summary,
            node: &prepared.node,
            upstream_inputs: &prepared.upstream_inputs,
            run_inputs: &prepared.run_inputs,
            tool_registry: &deps.tool_registry,
            tool_context: &prepared.tool_context,
            decision_client: deps.decision_client.as_ref(),
            cancellation: &prepared.cancellation,
            max_turns: deps.max_turns,
            is_sink: prepared.is_sink,
            requested_deliverables: &prepared.requested_deliverables,
            workspace_root: &prepared.workspace_root,
        };

        let outcome = run_node_decision_loop(input, &live_log).await;

        if integrate_outcome(&record, &node_id, outcome) {
            return;
        }
    }

    finish_run(&record);
}

fn admit(record: &Arc<RunRecord>) -> bool {
    let mut run = record.run.lock();
    if run.status != RunStatus::Queued {
        return false;
    }
    run.status = RunStatus::Running;
    run.started_at = Some(now_iso());
    append(&mut run, &record.events_tx, EventCategory::Lifecycle, "Run started", "Run started".to_string(), None, None);
    let message = format!("workspace ready at {}", run.workspace.workspace_root().display());
    append(&mut run, &record.events_tx, EventCategory::Input, "Run workspace ready", message, None, None);
    broadcast_state(&run, &record.events_tx);
    true
}

/// If cancellation was requested, finalize as cancelled and signal the
/// caller to stop iterating.
fn observe_cancellation(record: &Arc<RunRecord>) -> bool {
    let mut run = record.run.lock();
    if !run.cancel_requested {
        return false;
    }
    finalize_cancelled(&mut run);
    log_cancelled_once(&mut run, &record.events_tx);
    broadcast_state(&run, &record.events_tx);
    broadcast_complete(&record.events_tx);
    true
}

struct PreparedNode {
    node: wre_workflow::Node,
    upstream_inputs: Vec<UpstreamInput>,
    is_sink: bool,
    requested_deliverables: Vec<String>,
    run_inputs: Value,
    workflow_prompt: String,
    workflow_summary: String,
    workspace_root: String,
    tool_context: ToolContext,
    cancellation: tokio_util::sync::CancellationToken,
}

fn prepare_node(record: &Arc<RunRecord>, node_id: &str) -> PreparedNode {
    let mut run = record.run.lock();
    let node = run
        .graph
        .node_map
        .get(node_id)
        .cloned()
        .expect("node present in graph for its own topological order");

    run.active_node_id = Some(node_id.to_string());
    let now = now_iso();
    if let Some(node_run) = run.node_runs.get_mut(node_id) {
        node_run.status = RunStatus::Running;
        node_run.started_at = Some(now);
    }
    let message = format!("{} is now running", node.name);
    append(&mut run, &record.events_tx, EventCategory::Lifecycle, "Agent running", message, Some(node_id.to_string()), None);

    let upstream_inputs = gather_upstream_inputs(&run, node_id, &node);
    let summary_payload = summarize_upstream(&upstream_inputs);
    if let Some(node_run) = run.node_runs.get_mut(node_id) {
        node_run.upstream_inputs = upstream_inputs
            .iter()
            .map(|u| serde_json::to_value(&u.packet).unwrap_or(Value::Null))
            .collect();
    }
    append(
        &mut run,
        &record.events_tx,
        EventCategory::Input,
        "Agent inputs prepared",
        "inputs prepared for node".to_string(),
        Some(node_id.to_string()),
        Some(summary_payload),
    );
    broadcast_state(&run, &record.events_tx);

    let is_sink = run
        .graph
        .outgoing_edges
        .get(node_id)
        .is_none_or(Vec::is_empty);

    PreparedNode {
        node,
        upstream_inputs,
        is_sink,
        requested_deliverables: run.requested_deliverables.clone(),
        run_inputs: run.inputs.clone(),
        workflow_prompt: run.workflow_prompt.clone(),
        workflow_summary: run.workflow_summary.clone(),
        workspace_root: run.workspace.workspace_root().display().to_string(),
        tool_context: ToolContext::new(run.workspace.clone()),
        cancellation: run.cancellation.clone(),
    }
}

/// Materialize `upstreamInputs` for `node_id`: cached packet if one was
/// already brokered, else built on demand (`spec.md` §4.7 step 2).
fn gather_upstream_inputs(run: &Run, node_id: &str, node: &wre_workflow::Node) -> Vec<UpstreamInput> {
    let Some(edges) = run.graph.incoming_edges.get(node_id) else {
        return Vec::new();
    };

    edges
        .iter()
        .filter_map(|edge| {
            let source_output = run.node_outputs.get(&edge.source)?.clone();
            let key = format!("{}->{}", edge.source, edge.target);
            let packet = if let Some(packet) = run.handoff_packets.get(&key) {
                packet.clone()
            } else {
                let source_node = run.graph.node_map.get(&edge.source)?;
                build_handoff_packet(edge, &source_output, source_node, node)
            };
            Some(UpstreamInput { packet, source_output })
        })
        .collect()
}

fn summarize_upstream(upstream: &[UpstreamInput]) -> Value {
    let packet_types: Vec<&str> = upstream.iter().map(|u| u.packet.packet_type.as_str()).collect();
    let payload_keys: Vec<String> = upstream
        .iter()
        .flat_map(|u| u.packet.payload.keys().cloned())
        .collect();
    let missing: Vec<String> = upstream
        .iter()
        .flat_map(|u| u.packet.missing_required_fields.clone())
        .collect();

    let mut workspace_ref_count = 0usize;
    let mut sample_paths = Vec::new();
    for u in upstream {
        let refs = u.source_output.workspace_refs();
        workspace_ref_count += refs.len();
        for r in refs {
            if sample_paths.len() < 5 {
                sample_paths.push(r.path);
            }
        }
    }

    json!({
        "upstreamCount": upstream.len(),
        "packetTypes": packet_types,
        "payloadKeys": payload_keys,
        "workspaceRefCount": workspace_ref_count,
        "samplePaths": sample_paths,
        "missingRequiredFields": missing,
    })
}

/// Persist a node's outcome (or failure) and return `true` when the run
/// reached a terminal state and the caller should stop iterating.
fn integrate_outcome(
    record: &Arc<RunRecord>,
    node_id: &str,
    outcome: Result<wre_agent::NodeOutcome, wre_agent::AgentError>,
) -> bool {
    let mut run = record.run.lock();

    if run.cancel_requested {
        finalize_cancelled(&mut run);
        log_cancelled_once(&mut run, &record.events_tx);
        broadcast_state(&run, &record.events_tx);
        broadcast_complete(&record.events_tx);
        return true;
    }

    match outcome {
        Ok(outcome) => {
            let now = now_iso();
            if let Some(node_run) = run.node_runs.get_mut(node_id) {
                node_run.output = Some(outcome.output.clone());
                node_run.output_summary = Some(outcome.output.summary.clone());
            }
            run.node_outputs.insert(node_id.to_string(), outcome.output.clone());

            let outgoing = run
                .graph
                .outgoing_edges
                .get(node_id)
                .cloned()
                .unwrap_or_default();
            for edge in &outgoing {
                let Some(target_node) = run.graph.node_map.get(&edge.target).cloned() else {
                    continue;
                };
                let Some(source_node) = run.graph.node_map.get(&edge.source).cloned() else {
                    continue;
                };
                let packet = build_handoff_packet(edge, &outcome.output, &source_node, &target_node);
                let packet_json = serde_json::to_value(&packet).unwrap_or(Value::Null);
                run.handoff_packets
                    .insert(format!("{}->{}", edge.source, edge.target), packet);
                let message = format!("{} -> {}", edge.source, edge.target);
                append(
                    &mut run,
                    &record.events_tx,
                    EventCategory::Handoff,
                    "Handoff emitted",
                    message,
                    Some(node_id.to_string()),
                    Some(packet_json),
                );
            }

            if let Some(node_run) = run.node_runs.get_mut(node_id) {
                node_run.status = RunStatus::Success;
                node_run.finished_at = Some(now.clone());
                node_run.duration_ms = node_run
                    .started_at
                    .as_deref()
                    .map(|s| duration_ms_between(s, &now));
            }
            run.progress.completed += 1;
            run.active_node_id = None;
            broadcast_state(&run, &record.events_tx);
            false
        }
        Err(err) => {
            let now = now_iso();
            if let Some(node_run) = run.node_runs.get_mut(node_id) {
                node_run.status = RunStatus::Failed;
                node_run.finished_at = Some(now.clone());
                node_run.duration_ms = node_run
                    .started_at
                    .as_deref()
                    .map(|s| duration_ms_between(s, &now));
            }
            run.progress.failed += 1;
            run.status = RunStatus::Failed;
            run.error = Some(err.to_string());
            run.finished_at = Some(now.clone());
            run.duration_ms = run
                .started_at
                .as_deref()
                .map(|s| duration_ms_between(s, &now));
            run.active_node_id = None;
            append(
                &mut run,
                &record.events_tx,
                EventCategory::Error,
                "Run failed",
                err.to_string(),
                Some(node_id.to_string()),
                None,
            );
            broadcast_state(&run, &record.events_tx);
            broadcast_complete(&record.events_tx);
            true
        }
    }
}

fn finish_run(record: &Arc<RunRecord>) {
    let mut run = record.run.lock();
    if run.cancel_requested {
        finalize_cancelled(&mut run);
        log_cancelled_once(&mut run, &record.events_tx);
    } else if let Err(err) = finalize_success(&mut run) {
        run.status = RunStatus::Failed;
        run.error = Some(err.to_string());
        let now = now_iso();
        run.finished_at = Some(now.clone());
        run.duration_ms = run
            .started_at
            .as_deref()
            .map(|s| duration_ms_between(s, &now));
        append(
            &mut run,
            &record.events_tx,
            EventCategory::Error,
            "Run failed",
            err.to_string(),
            None,
            None,
        );
    } else {
        append(
            &mut run,
            &record.events_tx,
            EventCategory::Output,
            "Workflow outputs finalized",
            "Workflow outputs finalized".to_string(),
            None,
            None,
        );
    }
    broadcast_state(&run, &record.events_tx);
    broadcast_complete(&record.events_tx);
}

fn log_trace_event(record: &Arc<RunRecord>, node_id: &str, event: &TraceEvent) {
    let mut run = record.run.lock();
    let (category, title, message, payload) = trace_event_parts(event);
    append(&mut run, &record.events_tx, category, title, message, Some(node_id.to_string()), payload);
}

fn trace_event_parts(event: &TraceEvent) -> (EventCategory, &'static str, String, Option<Value>) {
    match event {
        TraceEvent::Thinking { turn } => (
            EventCategory::Thinking,
            "Agent thinking",
            format!("turn {turn}"),
            None,
        ),
        TraceEvent::ToolCompleted { turn, tool, args, duration_ms, workspace_refs } => (
            EventCategory::Output,
            "Tool call completed",
            format!("{tool} completed in {duration_ms}ms"),
            Some(json!({"turn": turn, "tool": tool, "args": args, "durationMs": duration_ms, "workspaceRefs": workspace_refs})),
        ),
        TraceEvent::ToolFailed { turn, tool, error } => (
            EventCategory::Error,
            "Tool call failed",
            format!("{tool} failed: {error}"),
            Some(json!({"turn": turn, "tool": tool, "error": error})),
        ),
        TraceEvent::RepetitionWarning { turn, tool } => (
            EventCategory::Control,
            "Repetition warning",
            format!("{tool} called repeatedly with identical arguments"),
            Some(json!({"turn": turn, "tool": tool})),
        ),
        TraceEvent::CircuitBreaker { turn, tool } => (
            EventCategory::Control,
            "Circuit breaker tripped",
            format!("further {tool} calls blocked"),
            Some(json!({"turn": turn, "tool": tool})),
        ),
        TraceEvent::ValidationRetry { turn, missing } => (
            EventCategory::Control,
            "Deliverable validation retry",
            format!("missing required code bundle deliverables: {}", missing.join(", ")),
            Some(json!({"turn": turn, "missing": missing})),
        ),
        TraceEvent::MalformedReplyRetry { turn, reason } => (
            EventCategory::Error,
            "Malformed reply retried",
            reason.clone(),
            Some(json!({"turn": turn, "reason": reason})),
        ),
        TraceEvent::Final { turn, summary } => (
            EventCategory::Output,
            "Agent finished",
            summary.clone(),
            Some(json!({"turn": turn})),
        ),
    }
}

fn log_cancelled_once(run: &mut Run, tx: &broadcast::Sender<StreamEvent>) {
    if run.cancelled_logged {
        return;
    }
    run.cancelled_logged = true;
    append(run, tx, EventCategory::Control, "Run cancelled", "Run cancelled".to_string(), None, None);
}

fn append(
    run: &mut Run,
    tx: &broadcast::Sender<StreamEvent>,
    category: EventCategory,
    title: &'static str,
    message: String,
    node_id: Option<String>,
    payload: Option<Value>,
) -> Event {
    let event = run.events.append(category, title, message, node_id, payload);
    let _ = tx.send(StreamEvent::Log(event.clone()));
    for change in synthesize_workspace_changes(&event) {
        let _ = tx.send(StreamEvent::WorkspaceChange(change));
    }
    event
}

fn broadcast_state(run: &Run, tx: &broadcast::Sender<StreamEvent>) {
    let _ = tx.send(StreamEvent::State(run.state_snapshot()));
}

fn broadcast_complete(tx: &broadcast::Sender<StreamEvent>) {
    let _ = tx.send(StreamEvent::RunComplete);
}
