//! Routes for team lifecycle and estimation rounds.

use axum::extract::{Path, State};
use axum::{
    Json, Router,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use planning_poker_core::command::Command;
use planning_poker_core::replication::PublishedEvent;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use planning_poker_team::application::command_handlers::{self, TeamCommandResult};
use planning_poker_team::application::query_handlers::{self, TeamView};
use planning_poker_team::domain::aggregates::Connection;
use planning_poker_team::domain::commands;
use planning_poker_team::domain::estimate::{Deck, Estimate};
use planning_poker_team::domain::participant::Role;
use planning_poker_team::domain::snapshot::TeamSnapshot;

use crate::error::ApiError;
use crate::state::AppState;

/// A deck given either by name or as an explicit list of cards.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DeckChoice {
    /// One of the predefined decks, e.g. `"fibonacci"`.
    Named(Deck),
    /// A custom list of cards.
    Custom(Vec<Estimate>),
}

impl DeckChoice {
    fn into_estimates(self) -> Vec<Estimate> {
        match self {
            Self::Named(deck) => deck.estimates(),
            Self::Custom(estimates) => estimates,
        }
    }
}

/// Request body for POST /teams.
#[derive(Debug, Deserialize)]
pub struct CreateTeamRequest {
    pub team_name: String,
    pub scrum_master: String,
    /// The standard deck when omitted.
    #[serde(default)]
    pub deck: Option<DeckChoice>,
}

/// Request body for POST /teams/{team}/join.
#[derive(Debug, Deserialize)]
pub struct JoinTeamRequest {
    pub participant: String,
    pub role: Role,
}

/// Request body for the reconnect and disconnect routes.
#[derive(Debug, Deserialize)]
pub struct ParticipantRequest {
    pub participant: String,
}

/// Request body for POST /teams/{team}/estimation/submit.
#[derive(Debug, Deserialize)]
pub struct SubmitEstimateRequest {
    pub participant: String,
    pub estimate: Estimate,
}

/// Request body for POST /teams/{team}/timer/start.
#[derive(Debug, Deserialize)]
pub struct StartTimerRequest {
    pub duration_secs: u32,
}

/// Request body for POST /teams/{team}/deck.
#[derive(Debug, Deserialize)]
pub struct ChangeDeckRequest {
    pub deck: DeckChoice,
}

/// Response body for routes that open a session.
#[derive(Debug, Serialize)]
pub struct ConnectionResponse {
    pub team_name: String,
    pub participant: String,
    /// Must accompany every message poll.
    pub session_id: Uuid,
    /// Baseline for the first message poll.
    pub last_message_id: u64,
    pub event_ids: Vec<Uuid>,
}

/// Response body returned after a command is successfully handled.
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub team_name: String,
    /// IDs of the replication events recorded by the command.
    pub event_ids: Vec<Uuid>,
}

/// Response body for POST /teams/{team}/timer/start.
#[derive(Debug, Serialize)]
pub struct TimerResponse {
    pub team_name: String,
    pub end_time: DateTime<Utc>,
    pub event_ids: Vec<Uuid>,
}

fn event_ids(events: &[PublishedEvent]) -> Vec<Uuid> {
    events.iter().map(|event| event.event_id).collect()
}

fn connection_response(
    result: &TeamCommandResult<Connection>,
    participant: &str,
) -> ConnectionResponse {
    ConnectionResponse {
        team_name: result.team_name.clone(),
        participant: participant.trim().to_owned(),
        session_id: result.value.session_id,
        last_message_id: result.value.last_message_id,
        event_ids: event_ids(&result.published_events),
    }
}

fn command_response<T>(result: &TeamCommandResult<T>) -> CommandResponse {
    CommandResponse {
        team_name: result.team_name.clone(),
        event_ids: event_ids(&result.published_events),
    }
}

/// POST /teams
#[instrument(skip(state, request), fields(team = %request.team_name))]
async fn create_team(
    State(state): State<AppState>,
    Json(request): Json<CreateTeamRequest>,
) -> Result<Json<ConnectionResponse>, ApiError> {
    let command = commands::CreateTeam {
        team_name: request.team_name,
        scrum_master: request.scrum_master,
        deck: request.deck.map(DeckChoice::into_estimates),
    };

    info!(
        scrum_master = %command.scrum_master,
        command = command.command_type(),
        "handling command"
    );

    let result =
        command_handlers::handle_create_team(&command, &state.registry, &*state.publisher).await?;

    Ok(Json(connection_response(&result, &command.scrum_master)))
}

/// GET /teams/{team}
#[instrument(skip(state))]
async fn get_team(
    State(state): State<AppState>,
    Path(team): Path<String>,
) -> Result<Json<TeamView>, ApiError> {
    let view = query_handlers::get_team(&team, &state.registry).await?;
    Ok(Json(view))
}

/// POST /teams/{team}/join
#[instrument(skip(state, request), fields(participant = %request.participant))]
async fn join_team(
    State(state): State<AppState>,
    Path(team): Path<String>,
    Json(request): Json<JoinTeamRequest>,
) -> Result<Json<ConnectionResponse>, ApiError> {
    let command = commands::JoinTeam {
        team_name: team,
        participant: request.participant,
        role: request.role,
    };

    info!(role = ?command.role, command = command.command_type(), "handling command");

    let result =
        command_handlers::handle_join_team(&command, &state.registry, &*state.publisher).await?;

    Ok(Json(connection_response(&result, &command.participant)))
}

/// POST /teams/{team}/reconnect
#[instrument(skip(state, request), fields(participant = %request.participant))]
async fn reconnect(
    State(state): State<AppState>,
    Path(team): Path<String>,
    Json(request): Json<ParticipantRequest>,
) -> Result<Json<ConnectionResponse>, ApiError> {
    let command = commands::ReconnectTeam {
        team_name: team,
        participant: request.participant,
    };

    info!(command = command.command_type(), "handling command");

    let result =
        command_handlers::handle_reconnect(&command, &state.registry, &*state.publisher).await?;

    Ok(Json(connection_response(&result, &command.participant)))
}

/// POST /teams/{team}/disconnect
#[instrument(skip(state, request), fields(participant = %request.participant))]
async fn disconnect(
    State(state): State<AppState>,
    Path(team): Path<String>,
    Json(request): Json<ParticipantRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::DisconnectMember {
        team_name: team,
        participant: request.participant,
    };

    info!(command = command.command_type(), "handling command");

    let result =
        command_handlers::handle_disconnect(&command, &state.registry, &*state.publisher).await?;

    Ok(Json(command_response(&result)))
}

/// POST /teams/{team}/estimation/start
#[instrument(skip(state))]
async fn start_estimation(
    State(state): State<AppState>,
    Path(team): Path<String>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::StartEstimation { team_name: team };

    info!(command = command.command_type(), "handling command");

    let result =
        command_handlers::handle_start_estimation(&command, &state.registry, &*state.publisher)
            .await?;

    Ok(Json(command_response(&result)))
}

/// POST /teams/{team}/estimation/cancel
#[instrument(skip(state))]
async fn cancel_estimation(
    State(state): State<AppState>,
    Path(team): Path<String>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::CancelEstimation { team_name: team };

    info!(command = command.command_type(), "handling command");

    let result =
        command_handlers::handle_cancel_estimation(&command, &state.registry, &*state.publisher)
            .await?;

    Ok(Json(command_response(&result)))
}

/// POST /teams/{team}/estimation/submit
#[instrument(skip(state, request), fields(participant = %request.participant))]
async fn submit_estimate(
    State(state): State<AppState>,
    Path(team): Path<String>,
    Json(request): Json<SubmitEstimateRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::SubmitEstimate {
        team_name: team,
        participant: request.participant,
        estimate: request.estimate,
    };

    info!(command = command.command_type(), "handling command");

    let result =
        command_handlers::handle_submit_estimate(&command, &state.registry, &*state.publisher)
            .await?;

    Ok(Json(command_response(&result)))
}

/// POST /teams/{team}/timer/start
#[instrument(skip(state, request), fields(duration_secs = request.duration_secs))]
async fn start_timer(
    State(state): State<AppState>,
    Path(team): Path<String>,
    Json(request): Json<StartTimerRequest>,
) -> Result<Json<TimerResponse>, ApiError> {
    let command = commands::StartTimer {
        team_name: team,
        duration: chrono::Duration::seconds(i64::from(request.duration_secs)),
    };

    info!(command = command.command_type(), "handling command");

    let result =
        command_handlers::handle_start_timer(&command, &state.registry, &*state.publisher).await?;

    Ok(Json(TimerResponse {
        team_name: result.team_name.clone(),
        end_time: result.value,
        event_ids: event_ids(&result.published_events),
    }))
}

/// POST /teams/{team}/timer/cancel
#[instrument(skip(state))]
async fn cancel_timer(
    State(state): State<AppState>,
    Path(team): Path<String>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::CancelTimer { team_name: team };

    info!(command = command.command_type(), "handling command");

    let result =
        command_handlers::handle_cancel_timer(&command, &state.registry, &*state.publisher).await?;

    Ok(Json(command_response(&result)))
}

/// POST /teams/{team}/deck
#[instrument(skip(state, request))]
async fn change_deck(
    State(state): State<AppState>,
    Path(team): Path<String>,
    Json(request): Json<ChangeDeckRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::ChangeDeck {
        team_name: team,
        deck: request.deck.into_estimates(),
    };

    info!(
        cards = command.deck.len(),
        command = command.command_type(),
        "handling command"
    );

    let result =
        command_handlers::handle_change_deck(&command, &state.registry, &*state.publisher).await?;

    Ok(Json(command_response(&result)))
}

/// GET /teams/{team}/snapshot
#[instrument(skip(state))]
async fn get_snapshot(
    State(state): State<AppState>,
    Path(team): Path<String>,
) -> Result<Json<TeamSnapshot>, ApiError> {
    let snapshot = query_handlers::get_snapshot(&team, &state.registry).await?;
    Ok(Json(snapshot))
}

/// Returns the router for team routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/teams", post(create_team))
        .route("/teams/{team}", get(get_team))
        .route("/teams/{team}/join", post(join_team))
        .route("/teams/{team}/reconnect", post(reconnect))
        .route("/teams/{team}/disconnect", post(disconnect))
        .route("/teams/{team}/estimation/start", post(start_estimation))
        .route("/teams/{team}/estimation/cancel", post(cancel_estimation))
        .route("/teams/{team}/estimation/submit", post(submit_estimate))
        .route("/teams/{team}/timer/start", post(start_timer))
        .route("/teams/{team}/timer/cancel", post(cancel_timer))
        .route("/teams/{team}/deck", post(change_deck))
        .route("/teams/{team}/snapshot", get(get_snapshot))
}
