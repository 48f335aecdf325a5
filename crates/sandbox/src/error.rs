use thiserror::Error;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("unsafe relative path: {0}")]
    UnsafePath(String),
    #[error("too many auxiliary files: {0} (maximum is 20)")]
    TooManyFiles(usize),
    #[error("file path '{0}' exceeds the maximum length of 200 characters")]
    FilePathTooLong(String),
    #[error("file '{0}' exceeds the maximum content length of 200000 characters")]
    FileTooLarge(String),
    #[error("failed to prepare sandbox directory: {0}")]
    Io(#[from] std::io::Error),
}
