//! Command handlers for the Scrum team context.
//!
//! Each handler locks the team, runs one aggregate operation and publishes
//! the recorded events to the replication bus before releasing the lock, so
//! the bus sees events in team order.

use chrono::{DateTime, Duration, Utc};
use planning_poker_core::aggregate::AggregateRoot;
use planning_poker_core::command::Command;
use planning_poker_core::error::DomainError;
use planning_poker_core::replication::{EventPublisher, PublishedEvent};
use tracing::{debug, error, info};

use crate::application::registry::TeamRegistry;
use crate::domain::aggregates::{Connection, ScrumTeam, TeamSettings};
use crate::domain::commands::{
    AcknowledgeMessages, CancelEstimation, CancelTimer, ChangeDeck, CreateTeam, DisconnectMember,
    JoinTeam, ReconnectTeam, StartEstimation, StartTimer, SubmitEstimate,
};
use crate::domain::estimate::Deck;
use crate::domain::events::{TeamEvent, TeamEventKind};
use crate::domain::snapshot::TeamSnapshot;

/// Result of a successfully handled command.
#[derive(Debug)]
pub struct TeamCommandResult<T> {
    /// The team the command ran against, as the team spells it.
    pub team_name: String,
    /// Operation-specific outcome.
    pub value: T,
    /// The events recorded and handed to the publisher.
    pub published_events: Vec<PublishedEvent>,
}

/// Participants disconnected and teams dropped by one reaper pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ReapReport {
    /// `(team, participant)` pairs that were disconnected.
    pub disconnected: Vec<(String, String)>,
    /// Teams removed because nobody was left connected.
    pub removed_teams: Vec<String>,
}

/// Drains a team's recorded events and hands them to the publisher.
///
/// A failed publish is logged and does not undo the local change.
pub(crate) async fn publish_recorded(
    team: &mut ScrumTeam,
    publisher: &dyn EventPublisher,
) -> Vec<PublishedEvent> {
    let events: Vec<PublishedEvent> = team
        .take_uncommitted_events()
        .iter()
        .map(PublishedEvent::from)
        .collect();
    if events.is_empty() {
        return events;
    }

    if let Err(err) = publisher.publish(&events).await {
        error!(team = %team.name(), error = %err, "failed to publish team events");
    } else {
        debug!(team = %team.name(), count = events.len(), "team events published");
    }
    events
}

async fn execute<T>(
    command: &impl Command,
    registry: &TeamRegistry,
    publisher: &dyn EventPublisher,
    operation: impl FnOnce(&mut ScrumTeam) -> Result<T, DomainError>,
) -> Result<TeamCommandResult<T>, DomainError> {
    let mut team = registry.lock(command.team_name()).await?;
    debug!(team = %team.name(), command = command.command_type(), "executing command");
    let value = operation(&mut *team)?;
    let published_events = publish_recorded(&mut team, publisher).await;

    Ok(TeamCommandResult {
        team_name: team.name().to_owned(),
        value,
        published_events,
    })
}

/// Handles the `CreateTeam` command: creates the team, registers it and
/// returns the Scrum Master's connection.
///
/// # Errors
///
/// Returns `DomainError::Validation` for invalid names or deck, or a team
/// name already in use.
pub async fn handle_create_team(
    command: &CreateTeam,
    registry: &TeamRegistry,
    publisher: &dyn EventPublisher,
) -> Result<TeamCommandResult<Connection>, DomainError> {
    let settings = TeamSettings {
        deck: command
            .deck
            .clone()
            .unwrap_or_else(|| Deck::Standard.estimates()),
        scrum_master_votes: registry.scrum_master_votes(),
    };
    let team = ScrumTeam::create(
        command.team_name.trim(),
        command.scrum_master.trim(),
        settings,
        registry.clock(),
    )?;
    let session_id = team
        .scrum_master()
        .map(|scrum_master| scrum_master.session_id())
        .ok_or_else(|| {
            DomainError::Infrastructure(format!("team {} has no scrum master", team.name()))
        })?;

    let mut team = registry.insert_new(team).await?;
    debug!(team = %team.name(), command = command.command_type(), "executing command");
    let published_events = publish_recorded(&mut team, publisher).await;

    Ok(TeamCommandResult {
        team_name: team.name().to_owned(),
        value: Connection {
            session_id,
            last_message_id: 0,
        },
        published_events,
    })
}

/// Handles the `JoinTeam` command.
///
/// # Errors
///
/// Returns `DomainError::TeamNotFound` for an unknown team and
/// `DomainError::Validation` for an invalid or taken name.
pub async fn handle_join_team(
    command: &JoinTeam,
    registry: &TeamRegistry,
    publisher: &dyn EventPublisher,
) -> Result<TeamCommandResult<Connection>, DomainError> {
    execute(command, registry, publisher, |team| {
        team.join(command.participant.trim(), command.role)
    })
    .await
}

/// Handles the `ReconnectTeam` command.
///
/// # Errors
///
/// Returns `DomainError::TeamNotFound` or `DomainError::ParticipantNotFound`.
pub async fn handle_reconnect(
    command: &ReconnectTeam,
    registry: &TeamRegistry,
    publisher: &dyn EventPublisher,
) -> Result<TeamCommandResult<Connection>, DomainError> {
    execute(command, registry, publisher, |team| {
        team.reconnect(command.participant.trim())
    })
    .await
}

/// Handles the `DisconnectMember` command.
///
/// # Errors
///
/// Returns `DomainError::TeamNotFound` or `DomainError::ParticipantNotFound`.
pub async fn handle_disconnect(
    command: &DisconnectMember,
    registry: &TeamRegistry,
    publisher: &dyn EventPublisher,
) -> Result<TeamCommandResult<()>, DomainError> {
    execute(command, registry, publisher, |team| {
        team.disconnect(command.participant.trim())
    })
    .await
}

/// Handles the `StartEstimation` command.
///
/// # Errors
///
/// Returns `DomainError::TeamNotFound` or `DomainError::IllegalTransition`.
pub async fn handle_start_estimation(
    command: &StartEstimation,
    registry: &TeamRegistry,
    publisher: &dyn EventPublisher,
) -> Result<TeamCommandResult<()>, DomainError> {
    execute(command, registry, publisher, ScrumTeam::start_estimation).await
}

/// Handles the `CancelEstimation` command.
///
/// # Errors
///
/// Returns `DomainError::TeamNotFound` or `DomainError::IllegalTransition`.
pub async fn handle_cancel_estimation(
    command: &CancelEstimation,
    registry: &TeamRegistry,
    publisher: &dyn EventPublisher,
) -> Result<TeamCommandResult<()>, DomainError> {
    execute(command, registry, publisher, ScrumTeam::cancel_estimation).await
}

/// Handles the `SubmitEstimate` command.
///
/// # Errors
///
/// Returns `DomainError::TeamNotFound`, `DomainError::ParticipantNotFound`,
/// `DomainError::IllegalTransition` or `DomainError::Validation`.
pub async fn handle_submit_estimate(
    command: &SubmitEstimate,
    registry: &TeamRegistry,
    publisher: &dyn EventPublisher,
) -> Result<TeamCommandResult<()>, DomainError> {
    execute(command, registry, publisher, |team| {
        team.submit_estimate(command.participant.trim(), command.estimate)
    })
    .await
}

/// Handles the `StartTimer` command; the countdown ends `duration` from the
/// team clock's now. Returns the end time.
///
/// # Errors
///
/// Returns `DomainError::TeamNotFound`, `DomainError::IllegalTransition` or
/// `DomainError::Validation` for a non-positive duration.
pub async fn handle_start_timer(
    command: &StartTimer,
    registry: &TeamRegistry,
    publisher: &dyn EventPublisher,
) -> Result<TeamCommandResult<DateTime<Utc>>, DomainError> {
    execute(command, registry, publisher, |team| {
        let end_time = team.now() + command.duration;
        team.start_timer(end_time)?;
        Ok(end_time)
    })
    .await
}

/// Handles the `CancelTimer` command.
///
/// # Errors
///
/// Returns `DomainError::TeamNotFound` or `DomainError::IllegalTransition`.
pub async fn handle_cancel_timer(
    command: &CancelTimer,
    registry: &TeamRegistry,
    publisher: &dyn EventPublisher,
) -> Result<TeamCommandResult<()>, DomainError> {
    execute(command, registry, publisher, ScrumTeam::cancel_timer).await
}

/// Handles the `ChangeDeck` command.
///
/// # Errors
///
/// Returns `DomainError::TeamNotFound`, `DomainError::IllegalTransition` or
/// `DomainError::Validation`.
pub async fn handle_change_deck(
    command: &ChangeDeck,
    registry: &TeamRegistry,
    publisher: &dyn EventPublisher,
) -> Result<TeamCommandResult<()>, DomainError> {
    execute(command, registry, publisher, |team| {
        team.change_deck(command.deck.clone())
    })
    .await
}

/// Handles the `AcknowledgeMessages` command.
///
/// # Errors
///
/// Returns `DomainError::TeamNotFound`, `DomainError::ParticipantNotFound` or
/// `DomainError::InvalidSession`.
pub async fn handle_acknowledge_messages(
    command: &AcknowledgeMessages,
    registry: &TeamRegistry,
    publisher: &dyn EventPublisher,
) -> Result<TeamCommandResult<()>, DomainError> {
    execute(command, registry, publisher, |team| {
        team.acknowledge_messages(
            command.participant.trim(),
            command.session_id,
            command.last_message_id,
        )
    })
    .await
}

/// Applies an event replicated from another node. Nothing is re-published.
///
/// A `TeamCreated` event registers the team; every other event must target
/// a registered team and arrive in sequence.
///
/// # Errors
///
/// Returns `DomainError::Reconstruction` for an undecodable event,
/// `DomainError::TeamNotFound` for an event of an unknown team and
/// `DomainError::ConcurrencyConflict` for an event that skips ahead.
pub async fn handle_apply_remote_event(
    published: &PublishedEvent,
    registry: &TeamRegistry,
) -> Result<(), DomainError> {
    let event = TeamEvent::try_from(published)?;

    if matches!(event.kind, TeamEventKind::TeamCreated(_)) {
        match registry.get(&event.metadata.team_name).await {
            Ok(_) => registry
                .lock(&event.metadata.team_name)
                .await?
                .apply_remote(&event)?,
            Err(DomainError::TeamNotFound(_)) => {
                let team = ScrumTeam::from_created_event(&event, registry.clock())?;
                drop(registry.replace(team).await);
                info!(team = %event.metadata.team_name, "replicated team registered");
            }
            Err(other) => return Err(other),
        }
        return Ok(());
    }

    let mut team = registry.lock(&event.metadata.team_name).await?;
    team.apply_remote(&event)
}

/// Replaces (or registers) a team from a snapshot.
///
/// # Errors
///
/// Returns `DomainError::Reconstruction` or `DomainError::Validation` if the
/// snapshot cannot be restored; the registry is left untouched then.
pub async fn handle_restore_snapshot(
    snapshot: &TeamSnapshot,
    registry: &TeamRegistry,
) -> Result<TeamCommandResult<i64>, DomainError> {
    let team = ScrumTeam::restore(snapshot, registry.clock())?;
    let team = registry.replace(team).await;
    info!(team = %team.name(), version = team.version(), "team restored from snapshot");

    Ok(TeamCommandResult {
        team_name: team.name().to_owned(),
        value: team.version(),
        published_events: Vec::new(),
    })
}

/// Disconnects participants idle for longer than `timeout` in every team and
/// drops teams left with nobody connected.
pub async fn handle_reap_inactive(
    registry: &TeamRegistry,
    publisher: &dyn EventPublisher,
    timeout: Duration,
) -> ReapReport {
    let mut report = ReapReport::default();

    for handle in registry.teams().await {
        let Some(mut team) = registry.lock_registered(&handle).await else {
            continue;
        };
        let team_name = team.name().to_owned();

        for participant in team.disconnect_inactive(timeout) {
            info!(team = %team_name, participant = %participant, "inactive participant disconnected");
            report.disconnected.push((team_name.clone(), participant));
        }
        publish_recorded(&mut team, publisher).await;

        if team.is_abandoned() && registry.remove_handle(&team_name, &handle).await {
            report.removed_teams.push(team_name);
        }
    }

    report
}
