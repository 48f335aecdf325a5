//! # Workflow Run Engine — sandbox
//!
//! Resource-limited subprocess execution backing the `sandbox_exec` tool:
//! path-safe auxiliary file staging, POSIX rlimits, timeout handling, and
//! artifact enumeration.

pub mod artifacts;
pub mod error;
pub mod exec;
pub mod model;
pub mod path;
pub mod rlimits;

pub use error::SandboxError;
pub use exec::run_sandbox_exec;
pub use model::{Artifact, Bounds, Language, SandboxExecArgs, SandboxExecResult};
