//! Success and cancellation finalization (`spec.md` §4.7).

use serde_json::Value;
use wre_core::time::now_iso;
use wre_handoff::NodeOutput;
use wre_workspace::{write_deliverable, write_manifest, WorkspaceError};

use crate::model::{Run, RunOutputs, RunStatus};
use crate::timing::duration_ms_between;

/// Collect sink outputs, compose `final_summary`/`final_markdown`, write
/// `final-output.md` plus one deliverable per requested name, write
/// `manifest.json`, and populate `run.outputs`. Stamps `finishedAt` and
/// transitions the run to `success`.
///
/// # Errors
/// Returns [`WorkspaceError`] if any deliverable or the manifest fails to
/// write; the caller treats that as a run failure.
pub fn finalize_success(run: &mut Run) -> Result<(), WorkspaceError> {
    let sink_ids: Vec<String> = run
        .graph
        .sink_nodes()
        .into_iter()
        .map(str::to_string)
        .collect();

    let sink_outputs: Vec<&NodeOutput> = sink_ids
        .iter()
        .filter_map(|id| run.node_outputs.get(id))
        .collect();

    let final_summary = sink_outputs
        .iter()
        .map(|o| o.summary.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let final_markdown = resolve_final_markdown(&run.workflow_name, &sink_outputs, &final_summary);

    let mut deliverables = vec![write_deliverable(
        &run.workspace,
        "final-output.md",
        &Value::String(final_markdown.clone()),
    )?];

    for name in run.requested_deliverables.clone() {
        let payload = resolve_deliverable_payload(run, &sink_ids, &name)
            .unwrap_or_else(|| Value::String(final_markdown.clone()));
        deliverables.push(write_deliverable(&run.workspace, &name, &payload)?);
    }

    write_manifest(
        &run.workspace,
        run.id.as_str(),
        &run.workflow_id,
        &run.workflow_name,
        &run.created_at,
        &deliverables,
    )?;

    let workspace_directories = vec![
        run.workspace.agent_scripts_dir().display().to_string(),
        run.workspace.user_uploads_dir().display().to_string(),
        run.workspace.inputs_dir().display().to_string(),
        run.workspace.deliverables_dir().display().to_string(),
    ];

    run.outputs = Some(RunOutputs {
        summary: final_summary,
        final_markdown,
        sink_node_ids: sink_ids,
        node_output_count: run.node_outputs.len(),
        artifact_directory: run.workspace.deliverables_dir().display().to_string(),
        artifact_manifest_path: run.workspace.manifest_path().display().to_string(),
        workspace_directory: run.workspace.workspace_root().display().to_string(),
        workspace_directories,
    });
    run.deliverables = deliverables;

    let now = now_iso();
    run.finished_at = Some(now.clone());
    run.duration_ms = run
        .started_at
        .as_deref()
        .map(|s| duration_ms_between(s, &now));
    run.status = RunStatus::Success;
    Ok(())
}

/// First non-empty of sink `data.final_markdown`/`finalMarkdown`, or
/// `details.agentDetails.final_markdown`; else a minimal template.
fn resolve_final_markdown(workflow_name: &str, sink_outputs: &[&NodeOutput], summary: &str) -> String {
    for output in sink_outputs {
        if let Some(text) = output
            .data
            .get("final_markdown")
            .or_else(|| output.data.get("finalMarkdown"))
            .and_then(Value::as_str)
        {
            if !text.trim().is_empty() {
                return text.to_string();
            }
        }
        if let Some(text) = output
            .details
            .get("agentDetails")
            .and_then(|v| v.get("final_markdown"))
            .and_then(Value::as_str)
        {
            if !text.trim().is_empty() {
                return text.to_string();
            }
        }
    }
    format!("# {workflow_name}\n\n{summary}")
}

/// Look for `data.deliverables[name]` across sink outputs first, then every
/// node output in topological order.
fn resolve_deliverable_payload(run: &Run, sink_ids: &[String], name: &str) -> Option<Value> {
    for id in sink_ids {
        if let Some(value) = deliverable_from(run, id, name) {
            return Some(value);
        }
    }
    for id in &run.graph.order {
        if let Some(value) = deliverable_from(run, id, name) {
            return Some(value);
        }
    }
    None
}

fn deliverable_from(run: &Run, node_id: &str, name: &str) -> Option<Value> {
    run.node_outputs
        .get(node_id)?
        .data
        .get("deliverables")?
        .get(name)
        .cloned()
}

/// Transition every non-terminal node to `cancelled`, backfilling
/// `finishedAt`/`durationMs`, then stamp the run terminal (`spec.md` §4.7
/// "Cancellation").
pub fn finalize_cancelled(run: &mut Run) {
    let now = now_iso();
    let order = run.graph.order.clone();
    for id in &order {
        if let Some(node_run) = run.node_runs.get_mut(id) {
            if !node_run.status.is_terminal() {
                if node_run.started_at.is_none() {
                    node_run.started_at = Some(now.clone());
                }
                node_run.finished_at = Some(now.clone());
                node_run.duration_ms = node_run
                    .started_at
                    .as_deref()
                    .map(|s| duration_ms_between(s, &now));
                node_run.status = RunStatus::Cancelled;
            }
        }
    }
    run.active_node_id = None;
    run.status = RunStatus::Cancelled;
    run.finished_at = Some(now.clone());
    run.duration_ms = run
        .started_at
        .as_deref()
        .map(|s| duration_ms_between(s, &now));
}
