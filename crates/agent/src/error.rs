use thiserror::Error;

/// Failure of the agent decision loop. Every variant here propagates to
/// node failure and then run failure (`spec.md` §7).
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent decision client failed: {0}")]
    Client(String),
    #[error("could not parse agent reply as JSON after one retry: {0}")]
    MalformedReply(String),
    #[error(
        "node {node} exceeded max decision turns ({max_turns}) without final output"
    )]
    TurnBudgetExhausted { node: String, max_turns: u32 },
    #[error("sink node output missing required code bundle deliverables: {0}")]
    MissingCodeBundleDeliverables(String),
    #[error(transparent)]
    Tool(#[from] wre_tools::ToolError),
}
