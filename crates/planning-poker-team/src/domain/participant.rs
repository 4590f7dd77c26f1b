//! Team participants: observers, members and the Scrum Master.

use chrono::{DateTime, Utc};
use planning_poker_core::error::DomainError;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use super::estimate::Estimate;
use super::message::{MemberRef, Message};
use super::queue::MessageQueue;

/// Role a participant holds in a team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Team owner. Never removed; goes dormant on disconnect.
    ScrumMaster,
    /// Votes in rounds. Removed on disconnect.
    Member,
    /// Watches rounds without voting. Removed on disconnect.
    Observer,
}

impl Role {
    /// Whether the role can hold an estimate.
    #[must_use]
    pub fn is_voter(self) -> bool {
        !matches!(self, Self::Observer)
    }

    /// Whether the role owns the team.
    #[must_use]
    pub fn is_owner(self) -> bool {
        matches!(self, Self::ScrumMaster)
    }
}

/// A person connected to a team.
///
/// Observers and members share the queue and session handling; the only
/// behavioral difference is that voters carry an estimate for the round in
/// progress. All mutation goes through the owning `ScrumTeam`, so every
/// change is recorded and replicated.
#[derive(Debug)]
pub struct Participant {
    name: String,
    role: Role,
    session_id: Uuid,
    last_activity: DateTime<Utc>,
    dormant: bool,
    estimate: Option<Estimate>,
    queue: MessageQueue,
}

impl Participant {
    pub(crate) fn new(name: String, role: Role, session_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            name,
            role,
            session_id,
            last_activity: now,
            dormant: false,
            estimate: None,
            queue: MessageQueue::new(),
        }
    }

    pub(crate) fn restore(
        name: String,
        role: Role,
        session_id: Uuid,
        last_activity: DateTime<Utc>,
        dormant: bool,
        estimate: Option<Estimate>,
        queue: MessageQueue,
    ) -> Self {
        Self {
            name,
            role,
            session_id,
            last_activity,
            dormant,
            estimate,
            queue,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// The single session currently allowed to read this participant's queue.
    #[must_use]
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    #[must_use]
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    /// True while a disconnected owner is retained in the team.
    #[must_use]
    pub fn is_dormant(&self) -> bool {
        self.dormant
    }

    /// Hidden estimate for the round in progress. Always `None` for observers.
    #[must_use]
    pub fn estimate(&self) -> Option<Estimate> {
        self.estimate
    }

    #[must_use]
    pub fn has_message(&self) -> bool {
        self.queue.has_message()
    }

    /// Pending messages in arrival order.
    pub fn messages(&self) -> impl ExactSizeIterator<Item = &Message> {
        self.queue.messages()
    }

    #[must_use]
    pub fn acknowledged_message_id(&self) -> u64 {
        self.queue.acknowledged_message_id()
    }

    #[must_use]
    pub fn last_message_id(&self) -> u64 {
        self.queue.last_message_id()
    }

    /// Edge-triggered "message available" signal carrying the last message id.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.queue.subscribe()
    }

    /// Reference to this participant for use in messages.
    #[must_use]
    pub fn member_ref(&self) -> MemberRef {
        MemberRef::new(self.name.clone(), self.role)
    }

    /// Fails unless `session_id` is the participant's current, non-empty session.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidSession` for a nil or superseded session.
    pub fn check_session(&self, session_id: Uuid) -> Result<(), DomainError> {
        if session_id.is_nil() || session_id != self.session_id {
            return Err(DomainError::InvalidSession {
                participant: self.name.clone(),
            });
        }
        Ok(())
    }

    /// Moves the acknowledgment cursor; the session must already be checked.
    ///
    /// Returns whether the cursor moved.
    pub(crate) fn acknowledge(&mut self, last_message_id: u64) -> bool {
        self.queue.acknowledge(last_message_id)
    }

    pub(crate) fn send_message(&mut self, message: Message) -> u64 {
        self.queue.push(message)
    }

    /// Empties the queue; returns the new acknowledged baseline.
    pub(crate) fn clear_messages(&mut self) -> u64 {
        self.queue.clear()
    }

    /// Stamps activity and wakes a dormant participant. Returns whether it was dormant.
    pub(crate) fn update_activity(&mut self, now: DateTime<Utc>) -> bool {
        let was_dormant = self.dormant;
        self.dormant = false;
        self.last_activity = now;
        was_dormant
    }

    pub(crate) fn start_session(&mut self, session_id: Uuid) {
        self.session_id = session_id;
    }

    pub(crate) fn set_dormant(&mut self) {
        self.dormant = true;
    }

    pub(crate) fn set_estimate(&mut self, estimate: Estimate) {
        if self.role.is_voter() {
            self.estimate = Some(estimate);
        }
    }

    pub(crate) fn clear_estimate(&mut self) {
        self.estimate = None;
    }

    pub(crate) fn queue(&self) -> &MessageQueue {
        &self.queue
    }
}
