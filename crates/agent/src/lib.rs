//! # Workflow Run Engine — agent
//!
//! The per-node agent decision loop (C6): turn-based calls into an
//! [`AgentDecisionClient`], tool dispatch through `wre-tools`, repetition
//! and circuit-breaker control, and sink-node deliverable-contract
//! validation.

pub mod client;
pub mod decision;
pub mod decision_loop;
pub mod error;
pub mod prompt;
pub mod repetition;
pub mod trace;

pub use client::{
    AgentDecisionClient, FallbackChatDecisionClient, MissingApiKeyClient, OpenAiChatDecisionClient,
};
pub use decision::{parse_agent_decision, AgentDecision, DecisionAction, ToolRequest};
pub use decision_loop::{run_node_decision_loop, DecisionLoopInput, LiveLogCallback, NodeOutcome};
pub use error::AgentError;
pub use trace::TraceEvent;
