//! Trace events the decision loop emits each turn, fed to both the
//! caller's `liveLogCallback` and the scheduler's event log (`spec.md`
//! §4.6 "Live logging").

use serde_json::Value;

/// One turn-scoped event emitted by [`crate::decision_loop::run_node_decision_loop`].
///
/// The scheduler logs each of these through the event log (C5) with a
/// `nodeId`, choosing the category/title/message per variant; `payload`
/// carries whatever structured detail the event names.
#[derive(Debug, Clone)]
pub enum TraceEvent {
    /// A turn began: the model is about to be called.
    Thinking { turn: u32 },
    /// The model requested a tool call and it completed successfully.
    ToolCompleted {
        turn: u32,
        tool: String,
        args: Value,
        duration_ms: u64,
        workspace_refs: Value,
    },
    /// The model requested a tool call and it failed.
    ToolFailed {
        turn: u32,
        tool: String,
        error: String,
    },
    /// A repetition warning was injected into history.
    RepetitionWarning { turn: u32, tool: String },
    /// The circuit breaker tripped.
    CircuitBreaker { turn: u32, tool: String },
    /// A sink node's final reply was missing a required code-bundle
    /// deliverable and is being retried.
    ValidationRetry { turn: u32, missing: Vec<String> },
    /// The model's reply could not be parsed and is being retried once.
    MalformedReplyRetry { turn: u32, reason: String },
    /// The loop produced a valid final decision.
    Final { turn: u32, summary: String },
}
