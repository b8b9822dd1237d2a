//! HTTP transport for the fetchbox file registry.
//!
//! A thin [axum] layer: each route maps onto one
//! [`FileRegistry`](fetchbox_registry::FileRegistry) operation and each
//! registry error kind onto a status code.

pub mod error;
mod handlers;
mod routes;
mod state;

pub use crate::routes::create_router;
pub use crate::state::AppState;
