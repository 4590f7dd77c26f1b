//! HTTP transport for the planning poker session engine.

use axum::Router;

pub mod config;
pub mod error;
pub mod reaper;
pub mod routes;
pub mod state;

use crate::state::AppState;

/// Builds the application router without transport layers.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::teams::router())
        .merge(routes::messages::router())
        .merge(routes::replication::router());

    Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", api)
        .with_state(state)
}
