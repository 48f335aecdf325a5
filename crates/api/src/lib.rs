//! # Workflow Run Engine — api
//!
//! The HTTP surface described in `spec.md` §6: session-cookie auth in
//! front of tool enumeration/dispatch and the run lifecycle endpoints.
//! Everything here is a thin translation layer over `wre-engine`/`wre-tools`
//! — no scheduling or tool-dispatch logic lives in this crate.

pub mod app;
pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

pub use app::build_router;
pub use auth::SessionAuth;
pub use error::ApiError;
pub use state::AppState;
