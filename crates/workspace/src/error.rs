use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("path '{0}' escapes the workspace root")]
    PathEscapesRoot(String),
    #[error("path '{0}' must be relative")]
    AbsolutePath(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}
