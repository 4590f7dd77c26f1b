//! Long-poll message delivery.

use axum::extract::{Path, Query, State};
use axum::{Json, Router, routing::get};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

use planning_poker_team::application::query_handlers::{self, MessagePoll, MessageView};

use crate::error::ApiError;
use crate::state::AppState;

/// Query string for GET /teams/{team}/members/{member}/messages.
#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub session_id: Uuid,
    /// Highest message id the client has consumed.
    #[serde(default)]
    pub last_message_id: u64,
}

/// Response body for a message poll; empty when the wait timed out.
#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<MessageView>,
}

/// GET /teams/{team}/members/{member}/messages
#[instrument(skip(state, query), fields(last_message_id = query.last_message_id))]
async fn poll_messages(
    State(state): State<AppState>,
    Path((team, member)): Path<(String, String)>,
    Query(query): Query<MessagesQuery>,
) -> Result<Json<MessagesResponse>, ApiError> {
    let poll = MessagePoll {
        team_name: team,
        participant: member,
        session_id: query.session_id,
        last_message_id: query.last_message_id,
        timeout: state.config.poll_timeout,
    };

    let messages =
        query_handlers::wait_for_messages(&poll, &state.registry, &*state.publisher).await?;
    debug!(count = messages.len(), "message poll answered");

    Ok(Json(MessagesResponse { messages }))
}

/// Returns the router for message delivery.
pub fn router() -> Router<AppState> {
    Router::new().route("/teams/{team}/members/{member}/messages", get(poll_messages))
}
