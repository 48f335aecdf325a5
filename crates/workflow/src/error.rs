use thiserror::Error;

/// Validation failure for a [`crate::model::WorkflowTemplate`].
///
/// Every variant here corresponds to a `400` at the admission endpoint
/// (`spec.md` §7): templates that fail to validate are never admitted into
/// the scheduler.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("template must declare at least one node")]
    NoNodes,
    #[error("template declares {0} nodes, exceeding the maximum of 30")]
    TooManyNodes(usize),
    #[error("node id '{0}' exceeds the maximum length of 80 characters")]
    NodeIdTooLong(String),
    #[error("duplicate node id '{0}'")]
    DuplicateNodeId(String),
    #[error("edge references unknown source node '{0}'")]
    UnknownSource(String),
    #[error("edge references unknown target node '{0}'")]
    UnknownTarget(String),
    #[error("edge from '{0}' to itself is not allowed")]
    SelfLoop(String),
    #[error("workflow contains a cycle")]
    Cyclic,
}
