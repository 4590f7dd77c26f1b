//! Routes through which peer nodes feed snapshots and events to this node.

use axum::extract::State;
use axum::{
    Json, Router,
    routing::{post, put},
};
use planning_poker_core::replication::PublishedEvent;
use serde::Serialize;
use tracing::{info, instrument};

use planning_poker_team::application::command_handlers;
use planning_poker_team::domain::snapshot::TeamSnapshot;

use crate::error::ApiError;
use crate::state::AppState;

/// Response body for PUT /snapshots.
#[derive(Debug, Serialize)]
pub struct RestoreResponse {
    pub team_name: String,
    pub version: i64,
}

/// Response body for POST /replication/events.
#[derive(Debug, Serialize)]
pub struct ApplyEventsResponse {
    /// Events handled, duplicates included.
    pub applied: usize,
}

/// PUT /snapshots
#[instrument(skip(state, snapshot), fields(team = %snapshot.name))]
async fn restore_snapshot(
    State(state): State<AppState>,
    Json(snapshot): Json<TeamSnapshot>,
) -> Result<Json<RestoreResponse>, ApiError> {
    info!(version = snapshot.version, "handling restore_snapshot command");

    let result = command_handlers::handle_restore_snapshot(&snapshot, &state.registry).await?;

    Ok(Json(RestoreResponse {
        team_name: result.team_name,
        version: result.value,
    }))
}

/// POST /replication/events
///
/// Events are applied in order; the first failure aborts the batch and the
/// events before it stay applied.
#[instrument(skip(state, events), fields(count = events.len()))]
async fn apply_events(
    State(state): State<AppState>,
    Json(events): Json<Vec<PublishedEvent>>,
) -> Result<Json<ApplyEventsResponse>, ApiError> {
    for event in &events {
        command_handlers::handle_apply_remote_event(event, &state.registry).await?;
    }

    info!("replicated events applied");

    Ok(Json(ApplyEventsResponse {
        applied: events.len(),
    }))
}

/// Returns the router for replication routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/snapshots", put(restore_snapshot))
        .route("/replication/events", post(apply_events))
}
