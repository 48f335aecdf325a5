//! The process-wide run registry (C8, `spec.md` §4.8).
//!
//! `spec.md` §5 describes a single reentrant mutex guarding the whole
//! registry map and every run reachable from it. This implementation takes
//! the ownership-language alternative `spec.md` §9 names explicitly: a
//! [`DashMap`] for the map itself (fine-grained, no single lock to hold
//! across awaits) and one [`parking_lot::Mutex`] per run guarding that
//! run's mutable state — the scheduler still always releases its run's
//! mutex before any long-latency call, preserving the invariant that
//! matters.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use wre_agent::AgentDecisionClient;
use wre_core::time::now_iso;
use wre_core::RunId;
use wre_eventlog::{synthesize_workspace_changes, EventCategory, EventLog, StreamEvent};
use wre_tools::ToolRegistry;
use wre_workflow::TemplateGraph;
use wre_workspace::{materialize_uploads, RunWorkspace};

use crate::error::EngineError;
use crate::model::{
    NodeRun, Progress, Run, RunCreateRequest, RunListView, RunStatus, RunView,
    MAX_REQUESTED_DELIVERABLES,
};

/// Bounded channel capacity for a run's live event broadcast.
const EVENTS_CHANNEL_CAPACITY: usize = 1024;

/// Dependencies shared by every run's scheduler worker: the tool registry,
/// the injected decision client, the per-node turn budget, and the runs
/// root directory.
pub struct SchedulerDeps {
    pub tool_registry: Arc<ToolRegistry>,
    pub decision_client: Arc<dyn AgentDecisionClient>,
    pub max_turns: u32,
    pub runs_root: PathBuf,
}

/// One run's mutex-guarded state plus its live-event broadcast sender.
pub struct RunRecord {
    pub run: Mutex<Run>,
    pub events_tx: broadcast::Sender<StreamEvent>,
}

/// Process-wide runId→Run mapping plus the scheduler dependencies every
/// spawned worker shares.
pub struct Registry {
    runs: DashMap<RunId, Arc<RunRecord>>,
    deps: Arc<SchedulerDeps>,
}

impl Registry {
    #[must_use]
    pub fn new(deps: SchedulerDeps) -> Self {
        Self {
            runs: DashMap::new(),
            deps: Arc::new(deps),
        }
    }

    /// Validate the template, build the run and its workspace, spawn its
    /// scheduler worker, and return the full view (`spec.md` §4.8 `create`).
    ///
    /// # Errors
    /// Returns [`EngineError::Template`] when the template fails DAG
    /// validation, or [`EngineError::Workspace`] when workspace creation or
    /// upload materialization fails. Neither path admits the run into the
    /// scheduler.
    pub fn create(&self, request: RunCreateRequest) -> Result<RunView, EngineError> {
        let graph = TemplateGraph::build(&request.template)?;
        let requested_deliverables: Vec<String> = request
            .requested_deliverables
            .into_iter()
            .take(MAX_REQUESTED_DELIVERABLES)
            .collect();

        let run_id = RunId::generate();
        let workspace = RunWorkspace::create(&self.deps.runs_root, run_id.as_str())?;
        RunWorkspace::write_json(&workspace.run_inputs_path(), &request.inputs)?;
        RunWorkspace::write_json(
            &workspace.run_context_path(),
            &serde_json::json!({
                "workflowId": request.template.id,
                "workflowName": request.template.name,
            }),
        )?;
        let uploads = materialize_uploads(&request.inputs, &workspace)?;
        RunWorkspace::write_json(
            &workspace.uploaded_files_manifest_path(),
            &serde_json::to_value(&uploads).unwrap_or(serde_json::json!([])),
        )?;

        let mut node_runs = HashMap::with_capacity(request.template.nodes.len());
        for node in &request.template.nodes {
            node_runs.insert(node.id.clone(), NodeRun::queued(node));
        }

        let mut events = EventLog::new();
        events.append(
            EventCategory::Lifecycle,
            "Run admitted",
            format!("run admitted for workflow {}", request.template.name),
            None,
            None,
        );

        let run = Run {
            id: run_id.clone(),
            workflow_id: request.template.id.clone(),
            workflow_name: request.template.name.clone(),
            workflow_prompt: request.template.prompt.clone(),
            workflow_summary: request.template.summary.clone(),
            workflow_snapshot: request.template.clone(),
            status: RunStatus::Queued,
            created_at: now_iso(),
            started_at: None,
            finished_at: None,
            duration_ms: None,
            inputs: request.inputs,
            requested_deliverables,
            outputs: None,
            deliverables: Vec::new(),
            cancel_requested: false,
            cancelled_logged: false,
            error: None,
            active_node_id: None,
            progress: Progress {
                total: u32::try_from(request.template.nodes.len()).unwrap_or(u32::MAX),
                completed: 0,
                failed: 0,
            },
            node_runs,
            workspace,
            graph,
            node_outputs: HashMap::new(),
            handoff_packets: HashMap::new(),
            events,
            cancellation: CancellationToken::new(),
        };

        let view = run.to_view();
        let (events_tx, _rx) = broadcast::channel(EVENTS_CHANNEL_CAPACITY);
        let record = Arc::new(RunRecord {
            run: Mutex::new(run),
            events_tx,
        });
        self.runs.insert(run_id, record.clone());

        let deps = self.deps.clone();
        tokio::spawn(async move { crate::scheduler::run_worker(record, deps).await });

        Ok(view)
    }

    /// Up to `min(limit, 500)` runs, newest first by `startedAt` then
    /// `createdAt`, stripped of `_meta`/`cancelRequested`/logs.
    #[must_use]
    pub fn list(&self, limit: usize) -> Vec<RunListView> {
        let limit = limit.min(500);
        let mut entries: Vec<(String, RunListView)> = self
            .runs
            .iter()
            .map(|entry| {
                let run = entry.value().run.lock();
                let sort_key = run.started_at.clone().unwrap_or_else(|| run.created_at.clone());
                (sort_key, run.to_list_view())
            })
            .collect();
        entries.sort_by(|a, b| b.0.cmp(&a.0));
        entries.into_iter().take(limit).map(|(_, v)| v).collect()
    }

    /// Full view including logs, or `None` if unknown.
    #[must_use]
    pub fn get(&self, run_id: &RunId) -> Option<RunView> {
        self.runs.get(run_id).map(|r| r.run.lock().to_view())
    }

    /// Set `cancelRequested`, log `control/Cancellation requested` once, and
    /// nudge the run's cancellation token. Idempotent: a second call on an
    /// already-cancelling or terminal run is a no-op besides returning the
    /// current view. Returns `None` if unknown.
    pub fn cancel(&self, run_id: &RunId) -> Option<RunView> {
        let record = self.runs.get(run_id)?;
        let mut run = record.run.lock();
        if !run.status.is_terminal() && !run.cancel_requested {
            run.cancel_requested = true;
            run.cancellation.cancel();
            let event = run.events.append(
                EventCategory::Control,
                "Cancellation requested",
                "cancellation requested",
                None,
                None,
            );
            let _ = record.events_tx.send(StreamEvent::Log(event));
        }
        Some(run.to_view())
    }

    /// Remove a terminal run from the registry, returning its stripped
    /// view.
    ///
    /// # Errors
    /// [`EngineError::NotFound`] if unknown; [`EngineError::StillActive`] if
    /// the run is `queued` or `running`.
    pub fn delete(&self, run_id: &RunId) -> Result<RunListView, EngineError> {
        {
            let record = self
                .runs
                .get(run_id)
                .ok_or_else(|| EngineError::NotFound(run_id.to_string()))?;
            let run = record.run.lock();
            if matches!(run.status, RunStatus::Queued | RunStatus::Running) {
                return Err(EngineError::StillActive(run_id.to_string()));
            }
        }
        let (_, record) = self
            .runs
            .remove(run_id)
            .ok_or_else(|| EngineError::NotFound(run_id.to_string()))?;
        Ok(record.run.lock().to_list_view())
    }

    /// Replay events since `last_seq` plus a fresh `state` snapshot. The
    /// live subscription is taken out *before* releasing the run's mutex,
    /// so no event can land in the gap between the replay snapshot and the
    /// subscription (the push-model alternative `spec.md` §9 recommends
    /// over polling). When the run is already terminal, the replay ends
    /// with one `run:complete` and the subscription is still returned but
    /// will simply never yield anything further. Returns `None` if
    /// unknown.
    #[must_use]
    pub fn stream(
        &self,
        run_id: &RunId,
        last_seq: i64,
    ) -> Option<(Vec<StreamEvent>, broadcast::Receiver<StreamEvent>, bool)> {
        let record = self.runs.get(run_id)?;
        let run = record.run.lock();
        let live = record.events_tx.subscribe();

        let mut replay: Vec<StreamEvent> = Vec::new();
        for event in run.events.since(last_seq) {
            replay.push(StreamEvent::Log(event.clone()));
            for change in synthesize_workspace_changes(event) {
                replay.push(StreamEvent::WorkspaceChange(change));
            }
        }
        replay.push(StreamEvent::State(run.state_snapshot()));

        let terminal = run.status.is_terminal();
        if terminal {
            replay.push(StreamEvent::RunComplete);
        }

        Some((replay, live, terminal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wre_workflow::{Edge, Node, WorkflowTemplate};

    struct NoopClient;

    #[async_trait::async_trait]
    impl AgentDecisionClient for NoopClient {
        async fn decide(
            &self,
            _system_prompt: &str,
            _user_text: &str,
            _schema_text: &str,
            _cancellation: &tokio_util::sync::CancellationToken,
        ) -> Result<String, wre_agent::AgentError> {
            Ok(serde_json::json!({"action": "final", "summary": "done"}).to_string())
        }
    }

    fn deps(tmp: &std::path::Path) -> SchedulerDeps {
        SchedulerDeps {
            tool_registry: Arc::new(wre_tools::default_registry()),
            decision_client: Arc::new(NoopClient),
            max_turns: 5,
            runs_root: tmp.to_path_buf(),
        }
    }

    fn single_node_template() -> WorkflowTemplate {
        WorkflowTemplate {
            id: "t1".to_string(),
            name: "Test".to_string(),
            prompt: "do the thing".to_string(),
            summary: String::new(),
            nodes: vec![Node {
                id: "a".to_string(),
                name: "Agent A".to_string(),
                role: "worker".to_string(),
                objective: "finish".to_string(),
            }],
            edges: vec![],
        }
    }

    #[test]
    fn create_rejects_invalid_template() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = Registry::new(deps(tmp.path()));
        let bad = WorkflowTemplate {
            id: "t".to_string(),
            name: "Bad".to_string(),
            prompt: String::new(),
            summary: String::new(),
            nodes: vec![],
            edges: vec![],
        };
        let err = registry
            .create(RunCreateRequest {
                template: bad,
                inputs: serde_json::json!({}),
                requested_deliverables: vec![],
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::Template(_)));
    }

    #[tokio::test]
    async fn create_admits_and_runs_to_success() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = Registry::new(deps(tmp.path()));
        let view = registry
            .create(RunCreateRequest {
                template: single_node_template(),
                inputs: serde_json::json!({}),
                requested_deliverables: vec![],
            })
            .unwrap();
        assert_eq!(view.status, RunStatus::Queued);

        let run_id = RunId::from_raw(view.id.clone());
        for _ in 0..50 {
            if registry.get(&run_id).unwrap().status.is_terminal() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        let finished = registry.get(&run_id).unwrap();
        assert_eq!(finished.status, RunStatus::Success);
        assert!(finished.deliverables.iter().any(|d| d.name == "final-output.md"));
    }

    #[test]
    fn delete_unknown_run_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = Registry::new(deps(tmp.path()));
        let err = registry.delete(&RunId::from_raw("wfr_missing")).unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }
}
