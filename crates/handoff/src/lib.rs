//! # Workflow Run Engine — handoff
//!
//! The typed handoff broker (C4): contract normalization, dotted-path field
//! resolution, total type coercion, and packet construction.

pub mod broker;
pub mod coerce;
pub mod model;
pub mod path;

pub use broker::build_handoff_packet;
pub use coerce::coerce_handoff_value;
pub use model::{FieldResult, HandoffPacket, NodeOutput, PacketSchema, WorkspaceRef};
pub use path::json_path_get;
