//! # Workflow Run Engine — workflow
//!
//! The workflow template data model (`Node`, `Edge`, `HandoffContract`) and
//! DAG validation/topological ordering used at run admission.

pub mod dag;
pub mod error;
pub mod model;

pub use dag::TemplateGraph;
pub use error::WorkflowError;
pub use model::{Edge, FieldType, HandoffContract, HandoffField, Node, WorkflowTemplate};
