//! Registry/admission error kinds (`spec.md` §7 "Validation errors",
//! "Registry errors").

use wre_workflow::WorkflowError;
use wre_workspace::WorkspaceError;

/// Errors the registry surfaces to its caller (the HTTP layer maps these
/// to status codes per `spec.md` §6/§7).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The submitted template failed DAG validation; never admitted.
    #[error("invalid workflow template: {0}")]
    Template(#[from] WorkflowError),
    /// Workspace creation or upload materialization failed at admission.
    #[error("workspace error: {0}")]
    Workspace(#[from] WorkspaceError),
    /// No run with this id is registered.
    #[error("run not found: {0}")]
    NotFound(String),
    /// `delete` was called on a run still `queued` or `running`.
    #[error("run {0} is still active and cannot be deleted")]
    StillActive(String),
}
