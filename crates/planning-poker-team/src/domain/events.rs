//! Domain events for the Scrum team context.
//!
//! Each event carries everything its effect needs (session ids, round
//! participants, end times), so a peer node can apply it without re-running
//! business rules against its own clock or random source.

use chrono::{DateTime, Utc};
use planning_poker_core::error::DomainError;
use planning_poker_core::event::{DomainEvent, EventMetadata};
use planning_poker_core::replication::PublishedEvent;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::estimate::Estimate;
use super::participant::Role;

/// Emitted when a team is created with its Scrum Master.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamCreated {
    /// The Scrum Master's name.
    pub scrum_master: String,
    /// The Scrum Master's first session.
    pub session_id: Uuid,
    /// Cards available in rounds.
    pub deck: Vec<Estimate>,
    /// Whether the Scrum Master is an estimation participant.
    pub scrum_master_votes: bool,
}

/// Emitted when a participant joins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantJoined {
    /// The participant's name.
    pub name: String,
    /// The participant's role.
    pub role: Role,
    /// The participant's session.
    pub session_id: Uuid,
}

/// Emitted when a participant opens a new session (reconnect or revival).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantReconnected {
    /// The participant's name.
    pub name: String,
    /// The new session.
    pub session_id: Uuid,
}

/// Emitted when a participant disconnects or is reaped for inactivity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantDisconnected {
    /// The participant's name.
    pub name: String,
}

/// Emitted when a participant shows activity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantActivity {
    /// The participant's name.
    pub name: String,
}

/// Emitted when a client confirms consumption of its messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagesAcknowledged {
    /// The participant's name.
    pub name: String,
    /// The new acknowledgment cursor.
    pub last_message_id: u64,
}

/// Emitted when a round opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimationStarted {
    /// Names of the estimation participants, in round order.
    pub participants: Vec<String>,
}

/// Emitted when a member plays a card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimateSubmitted {
    /// The member's name.
    pub name: String,
    /// The card played.
    pub estimate: Estimate,
}

/// Emitted when a round countdown starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerStarted {
    /// When the countdown ends.
    pub end_time: DateTime<Utc>,
}

/// Emitted when the team switches decks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckChanged {
    /// The new deck.
    pub deck: Vec<Estimate>,
}

/// Event type identifier for [`TeamCreated`].
pub const TEAM_CREATED_EVENT_TYPE: &str = "team.created";

/// Event type identifier for [`ParticipantJoined`].
pub const PARTICIPANT_JOINED_EVENT_TYPE: &str = "team.participant_joined";

/// Event type identifier for [`ParticipantReconnected`].
pub const PARTICIPANT_RECONNECTED_EVENT_TYPE: &str = "team.participant_reconnected";

/// Event type identifier for [`ParticipantDisconnected`].
pub const PARTICIPANT_DISCONNECTED_EVENT_TYPE: &str = "team.participant_disconnected";

/// Event type identifier for [`ParticipantActivity`].
pub const PARTICIPANT_ACTIVITY_EVENT_TYPE: &str = "team.participant_activity";

/// Event type identifier for [`MessagesAcknowledged`].
pub const MESSAGES_ACKNOWLEDGED_EVENT_TYPE: &str = "team.messages_acknowledged";

/// Event type identifier for [`EstimationStarted`].
pub const ESTIMATION_STARTED_EVENT_TYPE: &str = "team.estimation_started";

/// Event type identifier for a cancelled round.
pub const ESTIMATION_CANCELED_EVENT_TYPE: &str = "team.estimation_canceled";

/// Event type identifier for [`EstimateSubmitted`].
pub const ESTIMATE_SUBMITTED_EVENT_TYPE: &str = "team.estimate_submitted";

/// Event type identifier for [`TimerStarted`].
pub const TIMER_STARTED_EVENT_TYPE: &str = "team.timer_started";

/// Event type identifier for a cancelled countdown.
pub const TIMER_CANCELED_EVENT_TYPE: &str = "team.timer_canceled";

/// Event type identifier for [`DeckChanged`].
pub const DECK_CHANGED_EVENT_TYPE: &str = "team.deck_changed";

/// Event payload variants for the Scrum team context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TeamEventKind {
    /// A team has been created.
    TeamCreated(TeamCreated),
    /// A participant has joined.
    ParticipantJoined(ParticipantJoined),
    /// A participant has a new session.
    ParticipantReconnected(ParticipantReconnected),
    /// A participant has left or gone dormant.
    ParticipantDisconnected(ParticipantDisconnected),
    /// A participant has shown activity.
    ParticipantActivity(ParticipantActivity),
    /// A participant's client has acknowledged messages.
    MessagesAcknowledged(MessagesAcknowledged),
    /// A round has started.
    EstimationStarted(EstimationStarted),
    /// A round has been cancelled.
    EstimationCanceled,
    /// A member has estimated.
    EstimateSubmitted(EstimateSubmitted),
    /// A countdown has started.
    TimerStarted(TimerStarted),
    /// A countdown has been cancelled.
    TimerCanceled,
    /// The deck has changed.
    DeckChanged(DeckChanged),
}

impl TeamEventKind {
    /// Returns the event type name of this payload.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::TeamCreated(_) => TEAM_CREATED_EVENT_TYPE,
            Self::ParticipantJoined(_) => PARTICIPANT_JOINED_EVENT_TYPE,
            Self::ParticipantReconnected(_) => PARTICIPANT_RECONNECTED_EVENT_TYPE,
            Self::ParticipantDisconnected(_) => PARTICIPANT_DISCONNECTED_EVENT_TYPE,
            Self::ParticipantActivity(_) => PARTICIPANT_ACTIVITY_EVENT_TYPE,
            Self::MessagesAcknowledged(_) => MESSAGES_ACKNOWLEDGED_EVENT_TYPE,
            Self::EstimationStarted(_) => ESTIMATION_STARTED_EVENT_TYPE,
            Self::EstimationCanceled => ESTIMATION_CANCELED_EVENT_TYPE,
            Self::EstimateSubmitted(_) => ESTIMATE_SUBMITTED_EVENT_TYPE,
            Self::TimerStarted(_) => TIMER_STARTED_EVENT_TYPE,
            Self::TimerCanceled => TIMER_CANCELED_EVENT_TYPE,
            Self::DeckChanged(_) => DECK_CHANGED_EVENT_TYPE,
        }
    }
}

/// Domain event envelope for the Scrum team context.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: TeamEventKind,
}

impl DomainEvent for TeamEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn to_payload(&self) -> serde_json::Value {
        // Serialization of derived Serialize types to Value is infallible.
        serde_json::to_value(&self.kind).expect("TeamEventKind serialization is infallible")
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}

impl From<&TeamEvent> for PublishedEvent {
    fn from(event: &TeamEvent) -> Self {
        let meta = event.metadata();
        Self {
            event_id: meta.event_id,
            team_name: meta.team_name.clone(),
            event_type: event.event_type().to_owned(),
            payload: event.to_payload(),
            sequence_number: meta.sequence_number,
            occurred_at: meta.occurred_at,
        }
    }
}

impl TryFrom<&PublishedEvent> for TeamEvent {
    type Error = DomainError;

    fn try_from(published: &PublishedEvent) -> Result<Self, Self::Error> {
        let kind: TeamEventKind =
            serde_json::from_value(published.payload.clone()).map_err(|e| {
                DomainError::Reconstruction(format!("event deserialization failed: {e}"))
            })?;

        if kind.event_type() != published.event_type {
            return Err(DomainError::Reconstruction(format!(
                "event type {} does not match payload {}",
                published.event_type,
                kind.event_type()
            )));
        }

        Ok(Self {
            metadata: EventMetadata {
                event_id: published.event_id,
                event_type: published.event_type.clone(),
                team_name: published.team_name.clone(),
                sequence_number: published.sequence_number,
                occurred_at: published.occurred_at,
            },
            kind,
        })
    }
}
