//! # Workflow Run Engine — eventlog
//!
//! The run event log (C5): monotonic sequence-stamped append-only events
//! per run, plus the wire shapes for incremental SSE streaming.

pub mod log;
pub mod model;
pub mod stream;

pub use log::EventLog;
pub use model::{Event, EventCategory, MAX_MESSAGE_CHARS};
pub use stream::{synthesize_workspace_changes, StreamEvent, WorkspaceChangeEvent};
