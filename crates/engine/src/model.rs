//! Run/`NodeRun` data model (`spec.md` §3) and the external run views.
//!
//! The internal [`Run`] carries `_meta`-equivalent scheduling state
//! (`graph`, `node_outputs`, `handoff_packets`, `events`) alongside the
//! fields a caller sees; [`Run::to_view`] and [`Run::to_list_view`] strip
//! that internal state the way `spec.md` §4.8 requires of every registry
//! operation's response.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use wre_eventlog::{Event, EventLog};
use wre_handoff::{HandoffPacket, NodeOutput};
use wre_workflow::{TemplateGraph, WorkflowTemplate};
use wre_workspace::{Deliverable, RunWorkspace};

/// Shared status set for both `Run.status` and `NodeRun.status`
/// (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Queued,
    Running,
    Success,
    Failed,
    Cancelled,
}

impl RunStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Cancelled)
    }
}

/// `run.progress`: node counts by terminal outcome.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Progress {
    pub total: u32,
    pub completed: u32,
    pub failed: u32,
}

/// Per-node run record. Carries enough to build both the full and stripped
/// views without re-deriving anything from the event log besides its logs.
#[derive(Debug, Clone)]
pub struct NodeRun {
    pub node_id: String,
    pub name: String,
    pub role: String,
    pub objective: String,
    pub status: RunStatus,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub duration_ms: Option<u64>,
    pub output: Option<NodeOutput>,
    pub upstream_inputs: Vec<Value>,
    pub output_summary: Option<String>,
}

impl NodeRun {
    #[must_use]
    pub fn queued(node: &wre_workflow::Node) -> Self {
        Self {
            node_id: node.id.clone(),
            name: node.name.clone(),
            role: node.role.clone(),
            objective: node.objective.clone(),
            status: RunStatus::Queued,
            started_at: None,
            finished_at: None,
            duration_ms: None,
            output: None,
            upstream_inputs: Vec::new(),
            output_summary: None,
        }
    }
}

/// `run.outputs`, populated only at successful finalization (`spec.md` §4.7).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutputs {
    pub summary: String,
    pub final_markdown: String,
    pub sink_node_ids: Vec<String>,
    pub node_output_count: usize,
    pub artifact_directory: String,
    pub artifact_manifest_path: String,
    pub workspace_directory: String,
    pub workspace_directories: Vec<String>,
}

/// A request to admit a new run (`spec.md` §6 `RunCreateRequest`).
#[derive(Debug, Clone, serde::Deserialize)]
pub struct RunCreateRequest {
    pub template: WorkflowTemplate,
    #[serde(default)]
    pub inputs: Value,
    #[serde(default)]
    pub requested_deliverables: Vec<String>,
}

/// Maximum number of requested deliverable names retained (`spec.md` §6).
pub const MAX_REQUESTED_DELIVERABLES: usize = 20;

/// The full run record held behind a run's mutex. `graph`, `node_outputs`,
/// `handoff_packets`, and `events` are the `_meta` internal fields; `events`
/// additionally carries the monotonic `seq` counter.
pub struct Run {
    pub id: wre_core::RunId,
    pub workflow_id: String,
    pub workflow_name: String,
    pub workflow_prompt: String,
    pub workflow_summary: String,
    pub workflow_snapshot: WorkflowTemplate,
    pub status: RunStatus,
    pub created_at: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub duration_ms: Option<u64>,
    pub inputs: Value,
    pub requested_deliverables: Vec<String>,
    pub outputs: Option<RunOutputs>,
    pub deliverables: Vec<Deliverable>,
    pub cancel_requested: bool,
    pub cancelled_logged: bool,
    pub error: Option<String>,
    pub active_node_id: Option<String>,
    pub progress: Progress,
    pub node_runs: HashMap<String, NodeRun>,
    pub workspace: RunWorkspace,
    pub graph: TemplateGraph,
    pub node_outputs: HashMap<String, NodeOutput>,
    pub handoff_packets: HashMap<String, HandoffPacket>,
    pub events: EventLog,
    pub cancellation: CancellationToken,
}

impl Run {
    /// Node ids in topological order, the order `nodeRuns`/`logs` render in.
    #[must_use]
    pub fn ordered_node_ids(&self) -> &[String] {
        &self.graph.order
    }

    /// Full external view: everything but `_meta`/`cancelRequested`
    /// (`spec.md` §4.8 `get`).
    #[must_use]
    pub fn to_view(&self) -> RunView {
        let node_runs = self
            .ordered_node_ids()
            .iter()
            .filter_map(|id| self.node_runs.get(id))
            .map(|nr| NodeRunView {
                node_id: nr.node_id.clone(),
                name: nr.name.clone(),
                role: nr.role.clone(),
                objective: nr.objective.clone(),
                status: nr.status,
                started_at: nr.started_at.clone(),
                finished_at: nr.finished_at.clone(),
                duration_ms: nr.duration_ms,
                logs: self.events.node_log(&nr.node_id).to_vec(),
                output: nr.output.clone(),
                upstream_inputs: nr.upstream_inputs.clone(),
                output_summary: nr.output_summary.clone(),
            })
            .collect();

        RunView {
            id: self.id.as_str().to_string(),
            workflow_id: self.workflow_id.clone(),
            workflow_name: self.workflow_name.clone(),
            workflow_prompt: self.workflow_prompt.clone(),
            workflow_summary: self.workflow_summary.clone(),
            workflow_snapshot: self.workflow_snapshot.clone(),
            status: self.status,
            created_at: self.created_at.clone(),
            started_at: self.started_at.clone(),
            finished_at: self.finished_at.clone(),
            duration_ms: self.duration_ms,
            inputs: self.inputs.clone(),
            requested_deliverables: self.requested_deliverables.clone(),
            outputs: self.outputs.clone(),
            deliverables: self.deliverables.clone(),
            error: self.error.clone(),
            active_node_id: self.active_node_id.clone(),
            progress: self.progress,
            logs: self.events.all().to_vec(),
            node_runs,
            workspace_directory: self.workspace.workspace_root().display().to_string(),
        }
    }

    /// Stripped external view used by `list` (`spec.md` §4.8 `list`): no
    /// `_meta`, `cancelRequested`, run-level `logs`, or per-node
    /// `logs`/`output`/`upstreamInputs`.
    #[must_use]
    pub fn to_list_view(&self) -> RunListView {
        let node_runs = self
            .ordered_node_ids()
            .iter()
            .filter_map(|id| self.node_runs.get(id))
            .map(|nr| NodeRunStripped {
                node_id: nr.node_id.clone(),
                name: nr.name.clone(),
                role: nr.role.clone(),
                objective: nr.objective.clone(),
                status: nr.status,
                started_at: nr.started_at.clone(),
                finished_at: nr.finished_at.clone(),
                duration_ms: nr.duration_ms,
            })
            .collect();

        RunListView {
            id: self.id.as_str().to_string(),
            workflow_id: self.workflow_id.clone(),
            workflow_name: self.workflow_name.clone(),
            status: self.status,
            created_at: self.created_at.clone(),
            started_at: self.started_at.clone(),
            finished_at: self.finished_at.clone(),
            duration_ms: self.duration_ms,
            requested_deliverables: self.requested_deliverables.clone(),
            outputs: self.outputs.clone(),
            deliverables: self.deliverables.clone(),
            error: self.error.clone(),
            active_node_id: self.active_node_id.clone(),
            progress: self.progress,
            node_runs,
        }
    }

    /// `{runId, status, activeNodeId, nodeRuns:[{nodeId,name,status,...}]}`,
    /// the `state` SSE event payload (`spec.md` §4.5).
    #[must_use]
    pub fn state_snapshot(&self) -> Value {
        let node_runs: Vec<Value> = self
            .ordered_node_ids()
            .iter()
            .filter_map(|id| self.node_runs.get(id))
            .map(|nr| {
                serde_json::json!({
                    "nodeId": nr.node_id,
                    "name": nr.name,
                    "status": nr.status,
                    "startedAt": nr.started_at,
                    "finishedAt": nr.finished_at,
                })
            })
            .collect();

        serde_json::json!({
            "runId": self.id.as_str(),
            "status": self.status,
            "activeNodeId": self.active_node_id,
            "nodeRuns": node_runs,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRunView {
    pub node_id: String,
    pub name: String,
    pub role: String,
    pub objective: String,
    pub status: RunStatus,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub duration_ms: Option<u64>,
    pub logs: Vec<Event>,
    pub output: Option<NodeOutput>,
    pub upstream_inputs: Vec<Value>,
    pub output_summary: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRunStripped {
    pub node_id: String,
    pub name: String,
    pub role: String,
    pub objective: String,
    pub status: RunStatus,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunView {
    pub id: String,
    pub workflow_id: String,
    pub workflow_name: String,
    pub workflow_prompt: String,
    pub workflow_summary: String,
    pub workflow_snapshot: WorkflowTemplate,
    pub status: RunStatus,
    pub created_at: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub duration_ms: Option<u64>,
    pub inputs: Value,
    pub requested_deliverables: Vec<String>,
    pub outputs: Option<RunOutputs>,
    pub deliverables: Vec<Deliverable>,
    pub error: Option<String>,
    pub active_node_id: Option<String>,
    pub progress: Progress,
    pub logs: Vec<Event>,
    pub node_runs: Vec<NodeRunView>,
    pub workspace_directory: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunListView {
    pub id: String,
    pub workflow_id: String,
    pub workflow_name: String,
    pub status: RunStatus,
    pub created_at: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub duration_ms: Option<u64>,
    pub requested_deliverables: Vec<String>,
    pub outputs: Option<RunOutputs>,
    pub deliverables: Vec<Deliverable>,
    pub error: Option<String>,
    pub active_node_id: Option<String>,
    pub progress: Progress,
    pub node_runs: Vec<NodeRunStripped>,
}
