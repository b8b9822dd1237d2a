//! Route configuration.

use crate::handlers;
use crate::state::AppState;
use axum::Router;
use axum::routing::{delete, get, post, put};
use tower_http::trace::TraceLayer;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/upload", post(handlers::upload))
        .route("/download/{id}", get(handlers::download))
        .route("/delete/{id}", delete(handlers::delete))
        .route("/rename/{id}/new/{new_name}", put(handlers::rename))
        .route("/description/{id}", put(handlers::describe).get(handlers::description))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
