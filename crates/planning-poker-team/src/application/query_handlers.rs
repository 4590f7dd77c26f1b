//! Query handlers for the Scrum team context.
//!
//! Views are plain serializable DTOs. In-progress estimates are never
//! exposed; a view only says whether a member has estimated.

use std::time::Duration;

use chrono::{DateTime, Utc};
use planning_poker_core::aggregate::AggregateRoot;
use planning_poker_core::error::DomainError;
use planning_poker_core::replication::EventPublisher;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::application::command_handlers::publish_recorded;
use crate::application::registry::TeamRegistry;
use crate::domain::aggregates::{RoundState, ScrumTeam};
use crate::domain::estimate::Estimate;
use crate::domain::estimation_result::EstimationResult;
use crate::domain::message::{MemberRef, Message, MessageType};
use crate::domain::participant::{Participant, Role};
use crate::domain::snapshot::TeamSnapshot;

/// A participant as referenced from other views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberView {
    pub name: String,
    pub role: Role,
}

impl From<&MemberRef> for MemberView {
    fn from(member: &MemberRef) -> Self {
        Self {
            name: member.name().to_owned(),
            role: member.role(),
        }
    }
}

/// One participant of a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantView {
    pub name: String,
    pub role: Role,
    pub is_dormant: bool,
    /// Whether a card is down in the open round; the card stays hidden.
    pub has_estimated: bool,
}

impl From<&Participant> for ParticipantView {
    fn from(participant: &Participant) -> Self {
        Self {
            name: participant.name().to_owned(),
            role: participant.role(),
            is_dormant: participant.is_dormant(),
            has_estimated: participant.estimate().is_some(),
        }
    }
}

/// One line of a completed round.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimationEntryView {
    pub member: MemberView,
    /// `None` when the member did not submit.
    pub estimate: Option<Estimate>,
}

/// A completed round with its statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimationResultView {
    pub entries: Vec<EstimationEntryView>,
    pub sum: Option<f64>,
    pub average: Option<f64>,
    pub median: Option<f64>,
}

impl From<&EstimationResult> for EstimationResultView {
    fn from(result: &EstimationResult) -> Self {
        Self {
            entries: result
                .entries()
                .iter()
                .map(|entry| EstimationEntryView {
                    member: MemberView::from(entry.member()),
                    estimate: entry.estimate(),
                })
                .collect(),
            sum: result.sum(),
            average: result.average(),
            median: result.median(),
        }
    }
}

/// Read-only view of a team.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamView {
    pub name: String,
    /// Number of events applied.
    pub version: i64,
    pub state: RoundState,
    pub deck: Vec<Estimate>,
    pub scrum_master_votes: bool,
    pub timer_end_time: Option<DateTime<Utc>>,
    pub participants: Vec<ParticipantView>,
    /// Names still expected to vote in the open round.
    pub estimation_participants: Vec<String>,
    pub last_result: Option<EstimationResultView>,
}

impl From<&ScrumTeam> for TeamView {
    fn from(team: &ScrumTeam) -> Self {
        Self {
            name: team.name().to_owned(),
            version: team.version(),
            state: team.state(),
            deck: team.deck().to_vec(),
            scrum_master_votes: team.scrum_master_votes(),
            timer_end_time: team.timer_end_time(),
            participants: team.participants().iter().map(ParticipantView::from).collect(),
            estimation_participants: team
                .estimation_participants()
                .map(|member| member.name().to_owned())
                .collect(),
            last_result: team
                .last_result()
                .map(|result| EstimationResultView::from(result.as_ref())),
        }
    }
}

/// A queued message as delivered to a client.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageView {
    pub id: u64,
    pub message_type: MessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member: Option<MemberView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimation_result: Option<EstimationResultView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timer_end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deck: Option<Vec<Estimate>>,
}

impl From<&Message> for MessageView {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id(),
            message_type: message.message_type(),
            member: message.member().map(MemberView::from),
            estimation_result: message
                .estimation_result()
                .map(|result| EstimationResultView::from(result.as_ref())),
            timer_end_time: message.timer_end_time(),
            deck: message.deck().map(<[Estimate]>::to_vec),
        }
    }
}

/// Parameters of one long-poll request.
#[derive(Debug, Clone)]
pub struct MessagePoll {
    pub team_name: String,
    pub participant: String,
    /// The session the client was handed on join or reconnect.
    pub session_id: Uuid,
    /// Everything up to this id has been consumed and can be dropped.
    pub last_message_id: u64,
    /// How long to wait for a message before answering with none.
    pub timeout: Duration,
}

/// Retrieves a team by name.
///
/// # Errors
///
/// Returns `DomainError::TeamNotFound` if no such team is registered.
pub async fn get_team(team_name: &str, registry: &TeamRegistry) -> Result<TeamView, DomainError> {
    let team = registry.lock(team_name).await?;
    Ok(TeamView::from(&*team))
}

/// Captures a team snapshot for restart or replication.
///
/// # Errors
///
/// Returns `DomainError::TeamNotFound` if no such team is registered.
pub async fn get_snapshot(
    team_name: &str,
    registry: &TeamRegistry,
) -> Result<TeamSnapshot, DomainError> {
    let team = registry.lock(team_name).await?;
    Ok(team.snapshot())
}

fn pending_messages(team: &ScrumTeam, participant: &str) -> Result<Vec<MessageView>, DomainError> {
    let participant = team
        .participant(participant)
        .ok_or_else(|| DomainError::ParticipantNotFound {
            team: team.name().to_owned(),
            name: participant.to_owned(),
        })?;
    Ok(participant.messages().map(MessageView::from).collect())
}

/// Long-polls a participant's queue.
///
/// Acknowledges everything up to `poll.last_message_id`, records activity,
/// then returns the pending messages. With nothing pending it waits, without
/// holding the team lock, until a message arrives or `poll.timeout` passes;
/// an empty list means the wait timed out.
///
/// # Errors
///
/// Returns `DomainError::TeamNotFound`, `DomainError::ParticipantNotFound`
/// (also when the participant leaves during the wait) or
/// `DomainError::InvalidSession` (also when a newer session takes over
/// during the wait).
pub async fn wait_for_messages(
    poll: &MessagePoll,
    registry: &TeamRegistry,
    publisher: &dyn EventPublisher,
) -> Result<Vec<MessageView>, DomainError> {
    let participant = poll.participant.trim();

    let mut available = {
        let mut team = registry.lock(&poll.team_name).await?;
        team.acknowledge_messages(participant, poll.session_id, poll.last_message_id)?;
        team.update_activity(participant)?;
        publish_recorded(&mut team, publisher).await;

        let messages = pending_messages(&team, participant)?;
        if !messages.is_empty() {
            return Ok(messages);
        }
        team.participant(participant)
            .map(Participant::subscribe)
            .ok_or_else(|| DomainError::ParticipantNotFound {
                team: team.name().to_owned(),
                name: participant.to_owned(),
            })?
    };

    // A closed channel means the participant or its team is gone; the
    // re-check below reports that.
    if tokio::time::timeout(poll.timeout, available.changed())
        .await
        .is_err()
    {
        debug!(team = %poll.team_name, participant, "message poll timed out");
    }

    let team = registry.lock(&poll.team_name).await?;
    let current = team
        .participant(participant)
        .ok_or_else(|| DomainError::ParticipantNotFound {
            team: team.name().to_owned(),
            name: participant.to_owned(),
        })?;
    current.check_session(poll.session_id)?;
    pending_messages(&team, participant)
}
