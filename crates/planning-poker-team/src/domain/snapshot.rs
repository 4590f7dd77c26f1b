//! Plain snapshot structures for restart and replication.
//!
//! A snapshot carries the full state of one team, including every
//! participant's pending messages. Members referenced by messages, round
//! seats and results are stored by name and resolved against the restored
//! participant set; names that are no longer present become placeholder
//! members.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use planning_poker_core::clock::Clock;
use planning_poker_core::error::DomainError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::aggregates::{
    APPLIED_EVENT_HISTORY, AppliedEvent, RoundState, ScrumTeam, Seat, names_match, validate_name,
};
use super::estimate::{Estimate, validate_deck};
use super::estimation_result::EstimationResult;
use super::message::{MemberRef, Message, MessagePayload, MessageType};
use super::participant::{Participant, Role};
use super::queue::MessageQueue;

/// Snapshot of a whole team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamSnapshot {
    pub name: String,
    /// Number of events applied; replication resumes after this.
    pub version: i64,
    pub state: RoundState,
    pub deck: Vec<Estimate>,
    pub scrum_master_votes: bool,
    pub timer_end_time: Option<DateTime<Utc>>,
    pub participants: Vec<ParticipantSnapshot>,
    /// Seats of the open round; empty while idle.
    #[serde(default)]
    pub round: Vec<SeatSnapshot>,
    pub last_result: Option<EstimationResultSnapshot>,
    /// Most recent applied events, oldest first.
    #[serde(default)]
    pub applied_events: Vec<AppliedEvent>,
}

/// Snapshot of one participant and its queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticipantSnapshot {
    pub name: String,
    pub role: Role,
    pub session_id: Uuid,
    pub last_activity: DateTime<Utc>,
    pub is_dormant: bool,
    pub estimate: Option<Estimate>,
    pub last_message_id: u64,
    pub acknowledged_message_id: u64,
    pub messages: Vec<MessageSnapshot>,
}

/// Snapshot of a queued message. Exactly the reference matching
/// `message_type` is present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageSnapshot {
    pub id: u64,
    pub message_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimation_result: Option<EstimationResultSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer_end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deck: Option<Vec<Estimate>>,
}

/// Snapshot of a round seat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatSnapshot {
    pub member: String,
    pub departed: bool,
    pub parting_estimate: Option<Estimate>,
}

/// Snapshot of a completed round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimationResultSnapshot {
    pub entries: Vec<EstimationEntrySnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimationEntrySnapshot {
    pub member: String,
    pub estimate: Option<Estimate>,
}

impl TeamSnapshot {
    /// Encodes the snapshot as JSON.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if encoding fails.
    pub fn to_json(&self) -> Result<String, DomainError> {
        serde_json::to_string(self)
            .map_err(|e| DomainError::Infrastructure(format!("snapshot serialization failed: {e}")))
    }

    /// Decodes a JSON snapshot.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Reconstruction` for malformed JSON, including an
    /// unknown message type.
    pub fn from_json(json: &str) -> Result<Self, DomainError> {
        serde_json::from_str(json)
            .map_err(|e| DomainError::Reconstruction(format!("snapshot deserialization failed: {e}")))
    }
}

impl From<&EstimationResult> for EstimationResultSnapshot {
    fn from(result: &EstimationResult) -> Self {
        Self {
            entries: result
                .entries()
                .iter()
                .map(|entry| EstimationEntrySnapshot {
                    member: entry.member().name().to_owned(),
                    estimate: entry.estimate(),
                })
                .collect(),
        }
    }
}

impl From<&Message> for MessageSnapshot {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id(),
            message_type: message.message_type(),
            member: message.member().map(|member| member.name().to_owned()),
            estimation_result: message
                .estimation_result()
                .map(|result| EstimationResultSnapshot::from(result.as_ref())),
            timer_end_time: message.timer_end_time(),
            deck: message.deck().map(<[Estimate]>::to_vec),
        }
    }
}

impl From<&Participant> for ParticipantSnapshot {
    fn from(participant: &Participant) -> Self {
        Self {
            name: participant.name().to_owned(),
            role: participant.role(),
            session_id: participant.session_id(),
            last_activity: participant.last_activity(),
            is_dormant: participant.is_dormant(),
            estimate: participant.estimate(),
            last_message_id: participant.last_message_id(),
            acknowledged_message_id: participant.acknowledged_message_id(),
            messages: participant.queue().messages().map(MessageSnapshot::from).collect(),
        }
    }
}

/// Name-to-role lookup over the participants being restored.
struct Roster<'a>(&'a [ParticipantSnapshot]);

impl Roster<'_> {
    fn resolve(&self, name: &str) -> MemberRef {
        self.0
            .iter()
            .find(|p| names_match(&p.name, name))
            .map_or_else(
                || MemberRef::new(name, Role::Member),
                |p| MemberRef::new(p.name.clone(), p.role),
            )
    }

    /// Rebuilds a result and freezes it before it is attached anywhere.
    fn result(&self, snapshot: &EstimationResultSnapshot) -> Result<Arc<EstimationResult>, DomainError> {
        let mut result =
            EstimationResult::new(snapshot.entries.iter().map(|entry| self.resolve(&entry.member)));
        for entry in &snapshot.entries {
            let member = self.resolve(&entry.member);
            result.set_estimate(member.name(), entry.estimate)?;
        }
        Ok(result.freeze())
    }

    fn message(&self, snapshot: &MessageSnapshot) -> Result<Message, DomainError> {
        let missing = |what: &str| {
            DomainError::Reconstruction(format!(
                "message {} of type {:?} has no {what}",
                snapshot.id, snapshot.message_type
            ))
        };

        let payload = match snapshot.message_type {
            MessageType::Empty
            | MessageType::EstimationStarted
            | MessageType::EstimationCanceled
            | MessageType::TimerCanceled => MessagePayload::None,
            MessageType::MemberJoined
            | MessageType::MemberDisconnected
            | MessageType::MemberEstimated => {
                let name = snapshot.member.as_deref().ok_or_else(|| missing("member"))?;
                MessagePayload::Member(self.resolve(name))
            }
            MessageType::EstimationEnded => {
                let result = snapshot
                    .estimation_result
                    .as_ref()
                    .ok_or_else(|| missing("estimation result"))?;
                MessagePayload::EstimationResult(self.result(result)?)
            }
            MessageType::TimerStarted => {
                MessagePayload::TimerEnd(snapshot.timer_end_time.ok_or_else(|| missing("timer end time"))?)
            }
            MessageType::AvailableEstimationsChanged => {
                MessagePayload::Deck(snapshot.deck.clone().ok_or_else(|| missing("deck"))?)
            }
        };
        Ok(Message::restored(snapshot.id, snapshot.message_type, payload))
    }

    fn participant(&self, snapshot: &ParticipantSnapshot) -> Result<Participant, DomainError> {
        validate_name("participant", &snapshot.name)?;
        let messages = snapshot
            .messages
            .iter()
            .map(|message| self.message(message))
            .collect::<Result<Vec<_>, _>>()?;
        let queue = MessageQueue::restore(
            messages,
            snapshot.last_message_id,
            snapshot.acknowledged_message_id,
        )?;
        let estimate = if snapshot.role.is_voter() {
            snapshot.estimate
        } else {
            None
        };

        Ok(Participant::restore(
            snapshot.name.clone(),
            snapshot.role,
            snapshot.session_id,
            snapshot.last_activity,
            snapshot.is_dormant,
            estimate,
            queue,
        ))
    }
}

/// An estimating team needs seats, every seat still in the round must
/// belong to a present voter, and someone must still be expected to vote.
fn check_open_round(snapshot: &TeamSnapshot) -> Result<(), DomainError> {
    let broken = |reason: String| {
        Err(DomainError::Reconstruction(format!(
            "estimating team {} {reason}",
            snapshot.name
        )))
    };

    if snapshot.round.is_empty() {
        return broken("has no round seats".to_owned());
    }
    let mut pending = false;
    for seat in snapshot.round.iter().filter(|seat| !seat.departed) {
        let Some(holder) = snapshot
            .participants
            .iter()
            .find(|p| names_match(&p.name, &seat.member))
        else {
            return broken(format!("seats {} who is not a participant", seat.member));
        };
        if !holder.role.is_voter() {
            return broken(format!("seats observer {}", holder.name));
        }
        pending |= holder.estimate.is_none();
    }
    if !pending {
        return broken("has nobody left to vote".to_owned());
    }
    Ok(())
}

impl ScrumTeam {
    /// Captures the full team state.
    #[must_use]
    pub fn snapshot(&self) -> TeamSnapshot {
        TeamSnapshot {
            name: self.name.clone(),
            version: self.version,
            state: self.state,
            deck: self.deck.clone(),
            scrum_master_votes: self.scrum_master_votes,
            timer_end_time: self.timer_end_time,
            participants: self.participants.iter().map(ParticipantSnapshot::from).collect(),
            round: self
                .seats
                .iter()
                .map(|seat| SeatSnapshot {
                    member: seat.member.name().to_owned(),
                    departed: seat.departed,
                    parting_estimate: seat.parting_estimate,
                })
                .collect(),
            last_result: self
                .last_result
                .as_deref()
                .map(EstimationResultSnapshot::from),
            applied_events: self.applied_events.iter().copied().collect(),
        }
    }

    /// Rebuilds a team from a snapshot. Every restored result is frozen.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for invalid names or decks and
    /// `DomainError::Reconstruction` when the snapshot breaks a team or queue
    /// invariant or a message lacks its reference.
    pub fn restore(snapshot: &TeamSnapshot, clock: Arc<dyn Clock>) -> Result<Self, DomainError> {
        validate_name("team", &snapshot.name)?;
        validate_deck(&snapshot.deck)?;

        let owners = snapshot
            .participants
            .iter()
            .filter(|p| p.role.is_owner())
            .count();
        if owners != 1 {
            return Err(DomainError::Reconstruction(format!(
                "team {} has {owners} scrum masters",
                snapshot.name
            )));
        }
        for (index, participant) in snapshot.participants.iter().enumerate() {
            if snapshot.participants[..index]
                .iter()
                .any(|other| names_match(&other.name, &participant.name))
            {
                return Err(DomainError::Reconstruction(format!(
                    "participant {} appears twice in team {}",
                    participant.name, snapshot.name
                )));
            }
        }
        if snapshot.state == RoundState::Idle
            && (!snapshot.round.is_empty() || snapshot.timer_end_time.is_some())
        {
            return Err(DomainError::Reconstruction(format!(
                "idle team {} has an open round",
                snapshot.name
            )));
        }

        if snapshot.state == RoundState::Estimating {
            check_open_round(snapshot)?;
        }
        if snapshot
            .applied_events
            .iter()
            .any(|applied| applied.sequence_number < 1 || applied.sequence_number > snapshot.version)
        {
            return Err(DomainError::Reconstruction(format!(
                "team {} remembers events beyond version {}",
                snapshot.name, snapshot.version
            )));
        }

        let roster = Roster(&snapshot.participants);
        let participants = snapshot
            .participants
            .iter()
            .map(|participant| roster.participant(participant))
            .collect::<Result<Vec<_>, _>>()?;
        let seats = snapshot
            .round
            .iter()
            .map(|seat| Seat {
                member: roster.resolve(&seat.member),
                departed: seat.departed,
                parting_estimate: seat.parting_estimate,
            })
            .collect();
        let last_result = snapshot
            .last_result
            .as_ref()
            .map(|result| roster.result(result))
            .transpose()?;

        let mut team = Self::blank(snapshot.name.clone(), clock);
        team.version = snapshot.version;
        team.participants = participants;
        team.state = snapshot.state;
        team.deck.clone_from(&snapshot.deck);
        team.timer_end_time = snapshot.timer_end_time;
        team.seats = seats;
        team.last_result = last_result;
        team.scrum_master_votes = snapshot.scrum_master_votes;
        let skip = snapshot
            .applied_events
            .len()
            .saturating_sub(APPLIED_EVENT_HISTORY);
        for applied in &snapshot.applied_events[skip..] {
            team.remember_applied(*applied);
        }
        Ok(team)
    }
}
