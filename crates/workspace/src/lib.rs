//! # Workflow Run Engine — workspace
//!
//! The per-run on-disk workspace manager (C3): directory layout, name
//! sanitization, path-safe resolution, upload materialization, and
//! deliverable/manifest writing.

pub mod deliverables;
pub mod error;
pub mod layout;
pub mod safe_path;
pub mod sanitize;
pub mod uploads;

pub use deliverables::{write_deliverable, write_manifest, ArtifactKind, Deliverable};
pub use error::WorkspaceError;
pub use layout::{RunWorkspace, DEFAULT_RUNS_ROOT};
pub use safe_path::resolve_within;
pub use sanitize::sanitize_name;
pub use uploads::{materialize_uploads, MaterializedUpload};
