//! Notifications queued for participants.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::estimate::Estimate;
use super::estimation_result::EstimationResult;
use super::participant::Role;

/// Kind of state transition a message describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    /// Carries no information; used to wake a client without a state change.
    Empty,
    /// A round was opened.
    EstimationStarted,
    /// A round was cancelled before everyone voted.
    EstimationCanceled,
    /// The round countdown was stopped.
    TimerCanceled,
    /// Someone joined the team (or came back from dormancy).
    MemberJoined,
    /// Someone left the team (or went dormant).
    MemberDisconnected,
    /// A member placed a hidden estimate.
    MemberEstimated,
    /// A round completed; carries the frozen result.
    EstimationEnded,
    /// A round countdown started; carries its end time.
    TimerStarted,
    /// The team switched to another deck.
    AvailableEstimationsChanged,
}

/// Name and role of the participant a message is about.
///
/// Messages outlive participants (a member may leave while others still have
/// unacknowledged notifications about them), so the reference is by value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRef {
    name: String,
    role: Role,
}

impl MemberRef {
    /// Creates a reference to a participant.
    #[must_use]
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            role,
        }
    }

    /// Participant name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Participant role at the time the reference was taken.
    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }
}

/// Type-specific content of a message.
#[derive(Debug, Clone)]
pub(crate) enum MessagePayload {
    None,
    Member(MemberRef),
    EstimationResult(Arc<EstimationResult>),
    TimerEnd(DateTime<Utc>),
    Deck(Vec<Estimate>),
}

/// Immutable notification record. The owning queue assigns the id.
#[derive(Debug, Clone)]
pub struct Message {
    id: u64,
    message_type: MessageType,
    payload: MessagePayload,
}

impl Message {
    fn with_payload(message_type: MessageType, payload: MessagePayload) -> Self {
        Self {
            id: 0,
            message_type,
            payload,
        }
    }

    /// A message without payload.
    #[must_use]
    pub fn empty() -> Self {
        Self::with_payload(MessageType::Empty, MessagePayload::None)
    }

    #[must_use]
    pub fn estimation_started() -> Self {
        Self::with_payload(MessageType::EstimationStarted, MessagePayload::None)
    }

    #[must_use]
    pub fn estimation_canceled() -> Self {
        Self::with_payload(MessageType::EstimationCanceled, MessagePayload::None)
    }

    #[must_use]
    pub fn timer_canceled() -> Self {
        Self::with_payload(MessageType::TimerCanceled, MessagePayload::None)
    }

    #[must_use]
    pub fn member_joined(member: MemberRef) -> Self {
        Self::with_payload(MessageType::MemberJoined, MessagePayload::Member(member))
    }

    #[must_use]
    pub fn member_disconnected(member: MemberRef) -> Self {
        Self::with_payload(MessageType::MemberDisconnected, MessagePayload::Member(member))
    }

    #[must_use]
    pub fn member_estimated(member: MemberRef) -> Self {
        Self::with_payload(MessageType::MemberEstimated, MessagePayload::Member(member))
    }

    /// Message announcing a completed round. The result must already be frozen.
    #[must_use]
    pub fn estimation_ended(result: Arc<EstimationResult>) -> Self {
        debug_assert!(result.is_read_only());
        Self::with_payload(
            MessageType::EstimationEnded,
            MessagePayload::EstimationResult(result),
        )
    }

    #[must_use]
    pub fn timer_started(end_time: DateTime<Utc>) -> Self {
        Self::with_payload(MessageType::TimerStarted, MessagePayload::TimerEnd(end_time))
    }

    #[must_use]
    pub fn available_estimations_changed(deck: Vec<Estimate>) -> Self {
        Self::with_payload(
            MessageType::AvailableEstimationsChanged,
            MessagePayload::Deck(deck),
        )
    }

    /// Rebuilds a message read back from a snapshot, keeping its original id.
    pub(crate) fn restored(id: u64, message_type: MessageType, payload: MessagePayload) -> Self {
        Self {
            id,
            message_type,
            payload,
        }
    }

    /// Sets the queue-assigned id; only ever called once, by the owning queue.
    pub(crate) fn assign_id(&mut self, id: u64) {
        debug_assert_eq!(self.id, 0, "message id assigned twice");
        self.id = id;
    }

    /// Per-participant sequence number, starting at 1. Zero until queued.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    /// The participant the message is about, for member messages.
    #[must_use]
    pub fn member(&self) -> Option<&MemberRef> {
        match &self.payload {
            MessagePayload::Member(member) => Some(member),
            _ => None,
        }
    }

    /// The completed round, for `EstimationEnded`.
    #[must_use]
    pub fn estimation_result(&self) -> Option<&Arc<EstimationResult>> {
        match &self.payload {
            MessagePayload::EstimationResult(result) => Some(result),
            _ => None,
        }
    }

    /// The countdown end, for `TimerStarted`.
    #[must_use]
    pub fn timer_end_time(&self) -> Option<DateTime<Utc>> {
        match &self.payload {
            MessagePayload::TimerEnd(end_time) => Some(*end_time),
            _ => None,
        }
    }

    /// The new deck, for `AvailableEstimationsChanged`.
    #[must_use]
    pub fn deck(&self) -> Option<&[Estimate]> {
        match &self.payload {
            MessagePayload::Deck(deck) => Some(deck),
            _ => None,
        }
    }
}
