//! # Workflow Run Engine — engine
//!
//! The run registry (C8) and DAG scheduler (C7): admits workflow runs,
//! drives each through the per-node agent decision loop in topological
//! order, brokers handoff packets along edges, and finalizes deliverables.

pub mod error;
pub mod finalize;
pub mod model;
pub mod registry;
pub mod scheduler;
pub mod timing;

pub use error::EngineError;
pub use model::{
    NodeRun, NodeRunStripped, NodeRunView, Progress, Run, RunCreateRequest, RunListView,
    RunOutputs, RunStatus, RunView, MAX_REQUESTED_DELIVERABLES,
};
pub use registry::{Registry, RunRecord, SchedulerDeps};
