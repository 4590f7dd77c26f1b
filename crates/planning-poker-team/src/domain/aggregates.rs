//! Aggregate root for the Scrum team context.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use planning_poker_core::aggregate::AggregateRoot;
use planning_poker_core::clock::Clock;
use planning_poker_core::error::DomainError;
use planning_poker_core::event::EventMetadata;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::estimate::{Deck, Estimate, validate_deck};
use super::estimation_result::EstimationResult;
use super::events::{
    DeckChanged, EstimateSubmitted, EstimationStarted, MessagesAcknowledged, ParticipantActivity,
    ParticipantDisconnected, ParticipantJoined, ParticipantReconnected, TeamCreated, TeamEvent,
    TeamEventKind, TimerStarted,
};
use super::message::{MemberRef, Message};
use super::participant::{Participant, Role};

/// Longest accepted team or participant name, in characters.
pub const MAX_NAME_LENGTH: usize = 50;

/// How many applied events a team remembers for replicated duplicate checks.
pub const APPLIED_EVENT_HISTORY: usize = 256;

/// Round lifecycle of a team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundState {
    /// No round open; the last result (if any) is on display.
    Idle,
    /// A round is open and collecting estimates.
    Estimating,
}

/// Options fixed when a team is created.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamSettings {
    /// Cards available in rounds.
    pub deck: Vec<Estimate>,
    /// Whether the Scrum Master is an estimation participant.
    pub scrum_master_votes: bool,
}

impl Default for TeamSettings {
    fn default() -> Self {
        Self {
            deck: Deck::Standard.estimates(),
            scrum_master_votes: true,
        }
    }
}

/// Session handed to a client on create, join or reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Connection {
    /// The only session allowed to read and acknowledge the queue.
    pub session_id: Uuid,
    /// Baseline cursor; the client expects messages after this id.
    pub last_message_id: u64,
}

/// Identity of an event a team has applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedEvent {
    pub sequence_number: i64,
    pub event_id: Uuid,
}

/// A participant's place in the current round.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Seat {
    pub(crate) member: MemberRef,
    /// Set once the participant left or went dormant mid-round.
    pub(crate) departed: bool,
    /// What they had played when they left.
    pub(crate) parting_estimate: Option<Estimate>,
}

/// Checks a team or participant name.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a blank name or one longer than
/// [`MAX_NAME_LENGTH`] characters.
pub fn validate_name(kind: &str, name: &str) -> Result<(), DomainError> {
    if name.trim().is_empty() {
        return Err(DomainError::Validation(format!("{kind} name cannot be empty")));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(DomainError::Validation(format!(
            "{kind} name cannot be longer than {MAX_NAME_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Case-insensitive name comparison used for every lookup in a team.
pub(crate) fn names_match(left: &str, right: &str) -> bool {
    left.to_lowercase() == right.to_lowercase()
}

/// The aggregate root for a Scrum team.
///
/// Every mutating operation validates, records one [`TeamEvent`] and applies
/// it, which fans out exactly one message to each affected participant
/// before returning. Callers serialize access per team (see
/// `application::registry`), so message ids follow invocation order.
pub struct ScrumTeam {
    pub(crate) name: String,
    pub(crate) version: i64,
    pub(crate) participants: Vec<Participant>,
    pub(crate) state: RoundState,
    pub(crate) deck: Vec<Estimate>,
    pub(crate) timer_end_time: Option<DateTime<Utc>>,
    pub(crate) seats: Vec<Seat>,
    pub(crate) last_result: Option<Arc<EstimationResult>>,
    pub(crate) scrum_master_votes: bool,
    /// The most recent applied events, oldest first.
    pub(crate) applied_events: VecDeque<AppliedEvent>,
    pub(crate) clock: Arc<dyn Clock>,
    uncommitted_events: Vec<TeamEvent>,
}

impl ScrumTeam {
    /// Creates a team owned by `scrum_master`, producing a `TeamCreated` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for an invalid team name, Scrum
    /// Master name or deck.
    pub fn create(
        name: &str,
        scrum_master: &str,
        settings: TeamSettings,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, DomainError> {
        validate_name("team", name)?;
        validate_name("scrum master", scrum_master)?;
        validate_deck(&settings.deck)?;

        let mut team = Self::blank(name.to_owned(), clock);
        team.record(TeamEventKind::TeamCreated(TeamCreated {
            scrum_master: scrum_master.to_owned(),
            session_id: Uuid::new_v4(),
            deck: settings.deck,
            scrum_master_votes: settings.scrum_master_votes,
        }));
        Ok(team)
    }

    /// Creates the local replica of a team from its replicated `TeamCreated` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Reconstruction` if the event is not the first
    /// event of a team stream.
    pub fn from_created_event(event: &TeamEvent, clock: Arc<dyn Clock>) -> Result<Self, DomainError> {
        if !matches!(event.kind, TeamEventKind::TeamCreated(_))
            || event.metadata.sequence_number != 1
        {
            return Err(DomainError::Reconstruction(format!(
                "team {} cannot start from event {} #{}",
                event.metadata.team_name, event.metadata.event_type, event.metadata.sequence_number
            )));
        }

        let mut team = Self::blank(event.metadata.team_name.clone(), clock);
        team.apply(event);
        Ok(team)
    }

    pub(crate) fn blank(name: String, clock: Arc<dyn Clock>) -> Self {
        Self {
            name,
            version: 0,
            participants: Vec::new(),
            state: RoundState::Idle,
            deck: Vec::new(),
            timer_end_time: None,
            seats: Vec::new(),
            last_result: None,
            scrum_master_votes: true,
            applied_events: VecDeque::new(),
            clock,
            uncommitted_events: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn state(&self) -> RoundState {
        self.state
    }

    /// Cards currently available.
    #[must_use]
    pub fn deck(&self) -> &[Estimate] {
        &self.deck
    }

    /// End of the running countdown, if any.
    #[must_use]
    pub fn timer_end_time(&self) -> Option<DateTime<Utc>> {
        self.timer_end_time
    }

    /// Result of the last completed round; cleared when the next round starts.
    #[must_use]
    pub fn last_result(&self) -> Option<&Arc<EstimationResult>> {
        self.last_result.as_ref()
    }

    #[must_use]
    pub fn scrum_master_votes(&self) -> bool {
        self.scrum_master_votes
    }

    /// Id of the applied event with `sequence_number`, if still remembered.
    #[must_use]
    pub fn applied_event_id(&self, sequence_number: i64) -> Option<Uuid> {
        self.applied_events
            .iter()
            .find(|applied| applied.sequence_number == sequence_number)
            .map(|applied| applied.event_id)
    }

    pub(crate) fn remember_applied(&mut self, applied: AppliedEvent) {
        if self.applied_events.len() == APPLIED_EVENT_HISTORY {
            self.applied_events.pop_front();
        }
        self.applied_events.push_back(applied);
    }

    /// Current time on the team's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// All participants in join order.
    #[must_use]
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    #[must_use]
    pub fn scrum_master(&self) -> Option<&Participant> {
        self.participants.iter().find(|p| p.role().is_owner())
    }

    pub fn members(&self) -> impl Iterator<Item = &Participant> {
        self.participants
            .iter()
            .filter(|p| p.role() == Role::Member)
    }

    pub fn observers(&self) -> impl Iterator<Item = &Participant> {
        self.participants
            .iter()
            .filter(|p| p.role() == Role::Observer)
    }

    /// Looks up a member or observer by name, ignoring case.
    #[must_use]
    pub fn participant(&self, name: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| names_match(p.name(), name))
    }

    /// Participants still expected to vote in the open round.
    pub fn estimation_participants(&self) -> impl Iterator<Item = &MemberRef> {
        self.seats
            .iter()
            .filter(|seat| !seat.departed)
            .map(|seat| &seat.member)
    }

    /// True when nobody is connected any more (only a dormant owner remains).
    #[must_use]
    pub fn is_abandoned(&self) -> bool {
        self.participants.iter().all(Participant::is_dormant)
    }

    fn require(&self, name: &str) -> Result<&Participant, DomainError> {
        self.participant(name)
            .ok_or_else(|| DomainError::ParticipantNotFound {
                team: self.name.clone(),
                name: name.to_owned(),
            })
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.participants
            .iter()
            .position(|p| names_match(p.name(), name))
    }

    fn votes(&self, participant: &Participant) -> bool {
        if participant.is_dormant() {
            return false;
        }
        match participant.role() {
            Role::ScrumMaster => self.scrum_master_votes,
            Role::Member => true,
            Role::Observer => false,
        }
    }

    /// Joins a participant, producing a `ParticipantJoined` event.
    ///
    /// Joining with the name of a dormant participant of the same role
    /// revives it with a fresh session instead.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for an invalid or taken name, or an
    /// attempt to join as a second Scrum Master.
    pub fn join(&mut self, name: &str, role: Role) -> Result<Connection, DomainError> {
        validate_name("participant", name)?;

        if let Some(existing) = self.participant(name) {
            if existing.is_dormant() && existing.role() == role {
                let existing_name = existing.name().to_owned();
                return Ok(self.open_session(&existing_name));
            }
            return Err(DomainError::Validation(format!(
                "participant {name} already exists in team {}",
                self.name
            )));
        }
        if role.is_owner() {
            return Err(DomainError::Validation(format!(
                "team {} already has a scrum master",
                self.name
            )));
        }

        let session_id = Uuid::new_v4();
        self.record(TeamEventKind::ParticipantJoined(ParticipantJoined {
            name: name.to_owned(),
            role,
            session_id,
        }));
        Ok(Connection {
            session_id,
            last_message_id: 0,
        })
    }

    /// Opens a fresh session for an existing participant, producing a
    /// `ParticipantReconnected` event. Their queue is cleared; other
    /// participants' queues are untouched.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ParticipantNotFound` if nobody has that name.
    pub fn reconnect(&mut self, name: &str) -> Result<Connection, DomainError> {
        let name = self.require(name)?.name().to_owned();
        Ok(self.open_session(&name))
    }

    fn open_session(&mut self, name: &str) -> Connection {
        let session_id = Uuid::new_v4();
        self.record(TeamEventKind::ParticipantReconnected(ParticipantReconnected {
            name: name.to_owned(),
            session_id,
        }));
        let last_message_id = self
            .participant(name)
            .map_or(0, Participant::acknowledged_message_id);
        Connection {
            session_id,
            last_message_id,
        }
    }

    /// Disconnects a participant, producing a `ParticipantDisconnected` event.
    /// The Scrum Master goes dormant; everyone else is removed. Disconnecting
    /// an already dormant participant does nothing.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ParticipantNotFound` if nobody has that name.
    pub fn disconnect(&mut self, name: &str) -> Result<(), DomainError> {
        let participant = self.require(name)?;
        if participant.is_dormant() {
            return Ok(());
        }
        let name = participant.name().to_owned();
        self.record(TeamEventKind::ParticipantDisconnected(ParticipantDisconnected { name }));
        Ok(())
    }

    /// Stamps a participant's activity, producing a `ParticipantActivity` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ParticipantNotFound` if nobody has that name.
    pub fn update_activity(&mut self, name: &str) -> Result<(), DomainError> {
        let name = self.require(name)?.name().to_owned();
        self.record(TeamEventKind::ParticipantActivity(ParticipantActivity { name }));
        Ok(())
    }

    /// Confirms delivery of a participant's messages up to `last_message_id`.
    /// A cursor that does not move is a no-op and records nothing.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ParticipantNotFound` if nobody has that name and
    /// `DomainError::InvalidSession` if `session_id` is not the current one.
    pub fn acknowledge_messages(
        &mut self,
        name: &str,
        session_id: Uuid,
        last_message_id: u64,
    ) -> Result<(), DomainError> {
        let participant = self.require(name)?;
        participant.check_session(session_id)?;

        let cursor = last_message_id.min(participant.last_message_id());
        if cursor <= participant.acknowledged_message_id() {
            return Ok(());
        }

        let name = participant.name().to_owned();
        self.record(TeamEventKind::MessagesAcknowledged(MessagesAcknowledged {
            name,
            last_message_id: cursor,
        }));
        Ok(())
    }

    /// Opens a round, producing an `EstimationStarted` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::IllegalTransition` if a round is already open or
    /// nobody present can vote.
    pub fn start_estimation(&mut self) -> Result<(), DomainError> {
        if self.state != RoundState::Idle {
            return Err(DomainError::IllegalTransition(
                "estimation is already in progress".to_owned(),
            ));
        }

        let participants: Vec<String> = self
            .participants
            .iter()
            .filter(|p| self.votes(p))
            .map(|p| p.name().to_owned())
            .collect();
        if participants.is_empty() {
            return Err(DomainError::IllegalTransition(format!(
                "team {} has nobody to estimate",
                self.name
            )));
        }

        self.record(TeamEventKind::EstimationStarted(EstimationStarted { participants }));
        Ok(())
    }

    /// Cancels the open round, producing an `EstimationCanceled` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::IllegalTransition` if no round is open.
    pub fn cancel_estimation(&mut self) -> Result<(), DomainError> {
        self.require_estimating()?;
        self.record(TeamEventKind::EstimationCanceled);
        Ok(())
    }

    /// Records a member's hidden estimate, producing an `EstimateSubmitted`
    /// event. The round closes once every estimation participant has voted.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::IllegalTransition` if no round is open,
    /// `DomainError::ParticipantNotFound` for an unknown name and
    /// `DomainError::Validation` for observers, members outside the round,
    /// repeated votes and cards not in the deck.
    pub fn submit_estimate(&mut self, name: &str, estimate: Estimate) -> Result<(), DomainError> {
        self.require_estimating()?;
        let participant = self.require(name)?;

        if !participant.role().is_voter() {
            return Err(DomainError::Validation(format!(
                "observer {} cannot estimate",
                participant.name()
            )));
        }
        let seated = self
            .seats
            .iter()
            .any(|seat| !seat.departed && names_match(seat.member.name(), participant.name()));
        if !seated {
            return Err(DomainError::Validation(format!(
                "{} is not an estimation participant in this round",
                participant.name()
            )));
        }
        if participant.estimate().is_some() {
            return Err(DomainError::Validation(format!(
                "{} has already estimated",
                participant.name()
            )));
        }
        if !self.deck.contains(&estimate) {
            return Err(DomainError::Validation(format!(
                "estimate {estimate} is not available in team {}",
                self.name
            )));
        }

        let name = participant.name().to_owned();
        self.record(TeamEventKind::EstimateSubmitted(EstimateSubmitted { name, estimate }));
        Ok(())
    }

    /// Starts a countdown for the open round, producing a `TimerStarted` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::IllegalTransition` if no round is open and
    /// `DomainError::Validation` if `end_time` is not in the future.
    pub fn start_timer(&mut self, end_time: DateTime<Utc>) -> Result<(), DomainError> {
        self.require_estimating()?;
        if end_time <= self.clock.now() {
            return Err(DomainError::Validation(
                "timer end time must be in the future".to_owned(),
            ));
        }
        self.record(TeamEventKind::TimerStarted(TimerStarted { end_time }));
        Ok(())
    }

    /// Stops the running countdown, producing a `TimerCanceled` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::IllegalTransition` if no round is open or no
    /// countdown is running.
    pub fn cancel_timer(&mut self) -> Result<(), DomainError> {
        self.require_estimating()?;
        if self.timer_end_time.is_none() {
            return Err(DomainError::IllegalTransition(
                "no timer is running".to_owned(),
            ));
        }
        self.record(TeamEventKind::TimerCanceled);
        Ok(())
    }

    /// Switches decks between rounds, producing a `DeckChanged` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::IllegalTransition` during a round and
    /// `DomainError::Validation` for an unusable deck.
    pub fn change_deck(&mut self, deck: Vec<Estimate>) -> Result<(), DomainError> {
        if self.state != RoundState::Idle {
            return Err(DomainError::IllegalTransition(
                "deck cannot change during an estimation".to_owned(),
            ));
        }
        validate_deck(&deck)?;
        self.record(TeamEventKind::DeckChanged(DeckChanged { deck }));
        Ok(())
    }

    /// Disconnects every connected participant idle for longer than
    /// `timeout` and returns their names.
    pub fn disconnect_inactive(&mut self, timeout: Duration) -> Vec<String> {
        let cutoff = self.clock.now() - timeout;
        let inactive: Vec<String> = self
            .participants
            .iter()
            .filter(|p| !p.is_dormant() && p.last_activity() < cutoff)
            .map(|p| p.name().to_owned())
            .collect();

        for name in &inactive {
            self.record(TeamEventKind::ParticipantDisconnected(ParticipantDisconnected {
                name: name.clone(),
            }));
        }
        inactive
    }

    /// Drains the events recorded since the last call.
    pub fn take_uncommitted_events(&mut self) -> Vec<TeamEvent> {
        std::mem::take(&mut self.uncommitted_events)
    }

    fn require_estimating(&self) -> Result<(), DomainError> {
        if self.state != RoundState::Estimating {
            return Err(DomainError::IllegalTransition(
                "no estimation is in progress".to_owned(),
            ));
        }
        Ok(())
    }

    fn record(&mut self, kind: TeamEventKind) {
        let event = TeamEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: kind.event_type().to_owned(),
                team_name: self.name.clone(),
                sequence_number: self.version + 1,
                occurred_at: self.clock.now(),
            },
            kind,
        };

        self.apply(&event);
        self.uncommitted_events.push(event);
    }

    /// Sends a copy of `message` to every participant except `except`.
    fn broadcast(&mut self, message: &Message, except: Option<usize>) {
        for (index, participant) in self.participants.iter_mut().enumerate() {
            if Some(index) != except {
                participant.send_message(message.clone());
            }
        }
        debug!(team = %self.name, message_type = ?message.message_type(), "message broadcast");
    }

    /// Announces a dormant participant coming back, mirroring its disconnect.
    fn announce_revival(&mut self, index: usize) {
        let member = self.participants[index].member_ref();
        info!(team = %self.name, participant = member.name(), "dormant participant is back");
        self.broadcast(&Message::member_joined(member), Some(index));
    }

    fn clear_round(&mut self) {
        self.state = RoundState::Idle;
        self.seats.clear();
        self.timer_end_time = None;
        for participant in &mut self.participants {
            participant.clear_estimate();
        }
    }

    fn close_round_if_complete(&mut self) {
        if self.state != RoundState::Estimating {
            return;
        }
        let complete = self.seats.iter().filter(|seat| !seat.departed).all(|seat| {
            self.participant(seat.member.name())
                .is_some_and(|p| p.estimate().is_some())
        });
        if !complete {
            return;
        }

        let mut result = EstimationResult::new(self.seats.iter().map(|seat| seat.member.clone()));
        for seat in &self.seats {
            let estimate = if seat.departed {
                seat.parting_estimate
            } else {
                self.participant(seat.member.name())
                    .and_then(Participant::estimate)
            };
            if let Err(err) = result.set_estimate(seat.member.name(), estimate) {
                warn!(team = %self.name, error = %err, "could not record estimate in result");
            }
        }
        let result = result.freeze();

        self.clear_round();
        self.last_result = Some(Arc::clone(&result));
        info!(
            team = %self.name,
            average = ?result.average(),
            median = ?result.median(),
            "estimation ended"
        );
        self.broadcast(&Message::estimation_ended(result), None);
    }

    fn on_team_created(&mut self, payload: &TeamCreated, at: DateTime<Utc>) {
        self.deck.clone_from(&payload.deck);
        self.scrum_master_votes = payload.scrum_master_votes;
        self.participants.push(Participant::new(
            payload.scrum_master.clone(),
            Role::ScrumMaster,
            payload.session_id,
            at,
        ));
        info!(team = %self.name, scrum_master = %payload.scrum_master, "team created");
    }

    fn on_participant_joined(&mut self, payload: &ParticipantJoined, at: DateTime<Utc>) {
        let participant = Participant::new(payload.name.clone(), payload.role, payload.session_id, at);
        // Only participants already present hear about the newcomer.
        self.broadcast(&Message::member_joined(participant.member_ref()), None);
        self.participants.push(participant);
        info!(team = %self.name, participant = %payload.name, role = ?payload.role, "participant joined");
    }

    fn on_participant_reconnected(&mut self, payload: &ParticipantReconnected, at: DateTime<Utc>) {
        let Some(index) = self.position(&payload.name) else {
            warn!(team = %self.name, participant = %payload.name, "reconnect for unknown participant skipped");
            return;
        };
        let participant = &mut self.participants[index];
        participant.clear_messages();
        participant.start_session(payload.session_id);
        let was_dormant = participant.update_activity(at);
        info!(team = %self.name, participant = %payload.name, "participant reconnected");
        if was_dormant {
            self.announce_revival(index);
        }
    }

    fn on_participant_disconnected(&mut self, payload: &ParticipantDisconnected) {
        let Some(index) = self.position(&payload.name) else {
            warn!(team = %self.name, participant = %payload.name, "disconnect for unknown participant skipped");
            return;
        };
        let member = self.participants[index].member_ref();
        let parting_estimate = self.participants[index].estimate();

        if let Some(seat) = self
            .seats
            .iter_mut()
            .find(|seat| !seat.departed && names_match(seat.member.name(), member.name()))
        {
            seat.departed = true;
            seat.parting_estimate = parting_estimate;
        }

        let message = Message::member_disconnected(member.clone());
        if member.role().is_owner() {
            self.participants[index].set_dormant();
            self.broadcast(&message, Some(index));
        } else {
            self.participants.remove(index);
            self.broadcast(&message, None);
        }
        info!(team = %self.name, participant = member.name(), "participant disconnected");

        self.close_round_if_complete();
    }

    fn on_participant_activity(&mut self, payload: &ParticipantActivity, at: DateTime<Utc>) {
        let Some(index) = self.position(&payload.name) else {
            warn!(team = %self.name, participant = %payload.name, "activity for unknown participant skipped");
            return;
        };
        if self.participants[index].update_activity(at) {
            self.announce_revival(index);
        }
    }

    fn on_messages_acknowledged(&mut self, payload: &MessagesAcknowledged) {
        let Some(index) = self.position(&payload.name) else {
            warn!(team = %self.name, participant = %payload.name, "acknowledgment for unknown participant skipped");
            return;
        };
        self.participants[index].acknowledge(payload.last_message_id);
    }

    fn on_estimation_started(&mut self, payload: &EstimationStarted) {
        self.clear_round();
        self.last_result = None;
        self.seats = payload
            .participants
            .iter()
            .filter_map(|name| self.participant(name))
            .map(|participant| Seat {
                member: participant.member_ref(),
                departed: false,
                parting_estimate: None,
            })
            .collect();
        self.state = RoundState::Estimating;
        info!(team = %self.name, participants = self.seats.len(), "estimation started");
        self.broadcast(&Message::estimation_started(), None);
    }

    fn on_estimation_canceled(&mut self) {
        self.clear_round();
        info!(team = %self.name, "estimation canceled");
        self.broadcast(&Message::estimation_canceled(), None);
    }

    fn on_estimate_submitted(&mut self, payload: &EstimateSubmitted) {
        let Some(index) = self.position(&payload.name) else {
            warn!(team = %self.name, participant = %payload.name, "estimate for unknown participant skipped");
            return;
        };
        self.participants[index].set_estimate(payload.estimate);
        // The value itself stays hidden until the round closes.
        let member = self.participants[index].member_ref();
        self.broadcast(&Message::member_estimated(member), None);
        self.close_round_if_complete();
    }

    fn on_timer_started(&mut self, payload: &TimerStarted) {
        self.timer_end_time = Some(payload.end_time);
        self.broadcast(&Message::timer_started(payload.end_time), None);
    }

    fn on_timer_canceled(&mut self) {
        self.timer_end_time = None;
        self.broadcast(&Message::timer_canceled(), None);
    }

    fn on_deck_changed(&mut self, payload: &DeckChanged) {
        self.deck.clone_from(&payload.deck);
        self.broadcast(
            &Message::available_estimations_changed(payload.deck.clone()),
            None,
        );
    }
}

impl fmt::Debug for ScrumTeam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrumTeam")
            .field("name", &self.name)
            .field("version", &self.version)
            .field("state", &self.state)
            .field("participants", &self.participants)
            .field("timer_end_time", &self.timer_end_time)
            .finish_non_exhaustive()
    }
}

impl AggregateRoot for ScrumTeam {
    type Event = TeamEvent;

    fn aggregate_id(&self) -> &str {
        &self.name
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(&mut self, event: &Self::Event) {
        let at = event.metadata.occurred_at;
        match &event.kind {
            TeamEventKind::TeamCreated(payload) => self.on_team_created(payload, at),
            TeamEventKind::ParticipantJoined(payload) => self.on_participant_joined(payload, at),
            TeamEventKind::ParticipantReconnected(payload) => {
                self.on_participant_reconnected(payload, at);
            }
            TeamEventKind::ParticipantDisconnected(payload) => {
                self.on_participant_disconnected(payload);
            }
            TeamEventKind::ParticipantActivity(payload) => {
                self.on_participant_activity(payload, at);
            }
            TeamEventKind::MessagesAcknowledged(payload) => self.on_messages_acknowledged(payload),
            TeamEventKind::EstimationStarted(payload) => self.on_estimation_started(payload),
            TeamEventKind::EstimationCanceled => self.on_estimation_canceled(),
            TeamEventKind::EstimateSubmitted(payload) => self.on_estimate_submitted(payload),
            TeamEventKind::TimerStarted(payload) => self.on_timer_started(payload),
            TeamEventKind::TimerCanceled => self.on_timer_canceled(),
            TeamEventKind::DeckChanged(payload) => self.on_deck_changed(payload),
        }
        self.version += 1;
        self.remember_applied(AppliedEvent {
            sequence_number: self.version,
            event_id: event.metadata.event_id,
        });
    }

    fn apply_remote(&mut self, event: &Self::Event) -> Result<(), DomainError> {
        if !names_match(&event.metadata.team_name, &self.name) {
            return Err(DomainError::Reconstruction(format!(
                "event for team {} routed to team {}",
                event.metadata.team_name, self.name
            )));
        }

        let sequence_number = event.metadata.sequence_number;
        if sequence_number <= self.version {
            return match self.applied_event_id(sequence_number) {
                Some(event_id) if event_id == event.metadata.event_id => {
                    debug!(team = %self.name, sequence_number, "duplicate remote event ignored");
                    Ok(())
                }
                // Another node applied a different event at this position.
                Some(_) => {
                    warn!(
                        team = %self.name,
                        sequence_number,
                        event_id = %event.metadata.event_id,
                        "remote event diverges from local history"
                    );
                    Err(DomainError::ConcurrencyConflict {
                        team: self.name.clone(),
                        expected: self.version + 1,
                        actual: sequence_number,
                    })
                }
                None => {
                    warn!(
                        team = %self.name,
                        sequence_number,
                        "remote event older than the remembered history ignored"
                    );
                    Ok(())
                }
            };
        }
        if sequence_number != self.version + 1 {
            return Err(DomainError::ConcurrencyConflict {
                team: self.name.clone(),
                expected: self.version + 1,
                actual: sequence_number,
            });
        }

        self.apply(event);
        Ok(())
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    fn clear_uncommitted_events(&mut self) {
        self.uncommitted_events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use planning_poker_test_support::{FixedClock, ManualClock};

    use crate::domain::message::MessageType;

    fn start_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
    }

    fn fixed_clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock(start_time()))
    }

    fn settings(scrum_master_votes: bool) -> TeamSettings {
        TeamSettings {
            scrum_master_votes,
            ..TeamSettings::default()
        }
    }

    /// Team "Alpha" owned by A with members B and C.
    fn alpha(scrum_master_votes: bool, clock: Arc<dyn Clock>) -> ScrumTeam {
        let mut team = ScrumTeam::create("Alpha", "A", settings(scrum_master_votes), clock).unwrap();
        team.join("B", Role::Member).unwrap();
        team.join("C", Role::Member).unwrap();
        team
    }

    fn message_types(team: &ScrumTeam, name: &str) -> Vec<MessageType> {
        team.participant(name)
            .unwrap()
            .messages()
            .map(Message::message_type)
            .collect()
    }

    fn message_ids(team: &ScrumTeam, name: &str) -> Vec<u64> {
        team.participant(name)
            .unwrap()
            .messages()
            .map(Message::id)
            .collect()
    }

    #[test]
    fn test_create_produces_team_created_event() {
        // Act
        let team = ScrumTeam::create("Alpha", "A", TeamSettings::default(), fixed_clock()).unwrap();

        // Assert
        assert_eq!(team.version(), 1);
        assert_eq!(team.state(), RoundState::Idle);
        assert_eq!(team.scrum_master().unwrap().name(), "A");
        assert_eq!(team.deck().len(), 13);
        assert_eq!(team.uncommitted_events().len(), 1);
        assert_eq!(team.uncommitted_events()[0].metadata.sequence_number, 1);
        assert!(matches!(
            team.uncommitted_events()[0].kind,
            TeamEventKind::TeamCreated(_)
        ));
    }

    #[test]
    fn test_create_rejects_blank_and_long_names() {
        let blank = ScrumTeam::create("  ", "A", TeamSettings::default(), fixed_clock());
        let long_name = "x".repeat(MAX_NAME_LENGTH + 1);
        let long = ScrumTeam::create("Alpha", &long_name, TeamSettings::default(), fixed_clock());

        assert!(matches!(blank, Err(DomainError::Validation(_))));
        assert!(matches!(long, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_join_notifies_existing_participants_only() {
        // Arrange
        let mut team =
            ScrumTeam::create("Alpha", "A", TeamSettings::default(), fixed_clock()).unwrap();

        // Act
        let connection = team.join("B", Role::Member).unwrap();
        team.join("Watcher", Role::Observer).unwrap();

        // Assert
        assert_eq!(connection.last_message_id, 0);
        assert!(!connection.session_id.is_nil());
        assert_eq!(
            message_types(&team, "A"),
            vec![MessageType::MemberJoined, MessageType::MemberJoined]
        );
        assert_eq!(message_types(&team, "B"), vec![MessageType::MemberJoined]);
        assert!(!team.participant("Watcher").unwrap().has_message());
        assert_eq!(team.members().count(), 1);
        assert_eq!(team.observers().count(), 1);
    }

    #[test]
    fn test_join_rejects_taken_name_ignoring_case() {
        // Arrange
        let mut team = alpha(true, fixed_clock());
        let version = team.version();

        // Act
        let result = team.join("b", Role::Observer);

        // Assert
        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert_eq!(team.version(), version);
        assert_eq!(team.participants().len(), 3);
    }

    #[test]
    fn test_join_as_second_scrum_master_is_rejected() {
        let mut team = alpha(true, fixed_clock());

        let result = team.join("Z", Role::ScrumMaster);

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_full_round_closes_with_frozen_result_for_everyone() {
        // Arrange
        let mut team = alpha(false, fixed_clock());

        // Act
        team.start_estimation().unwrap();
        team.submit_estimate("B", Estimate::Value(5.0)).unwrap();
        assert_eq!(team.state(), RoundState::Estimating);
        team.submit_estimate("C", Estimate::Value(8.0)).unwrap();

        // Assert
        assert_eq!(team.state(), RoundState::Idle);
        assert_eq!(message_ids(&team, "A"), vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(message_ids(&team, "B"), vec![1, 2, 3, 4, 5]);
        assert_eq!(
            message_types(&team, "C"),
            vec![
                MessageType::EstimationStarted,
                MessageType::MemberEstimated,
                MessageType::MemberEstimated,
                MessageType::EstimationEnded,
            ]
        );
        for name in ["A", "B", "C"] {
            let participant = team.participant(name).unwrap();
            let last = participant.messages().last().unwrap();
            let result = last.estimation_result().unwrap();
            assert!(result.is_read_only());
            assert_eq!(result.entries().len(), 2);
            assert_eq!(result.estimate_of("B"), Some(Estimate::Value(5.0)));
            assert_eq!(result.estimate_of("C"), Some(Estimate::Value(8.0)));
            assert_eq!(result.sum(), Some(13.0));
            assert_eq!(result.average(), Some(6.5));
            assert_eq!(result.median(), Some(6.5));
            assert_eq!(participant.estimate(), None);
        }
        assert!(team.last_result().is_some());
    }

    #[test]
    fn test_result_cannot_be_altered_after_round_closes() {
        // Arrange
        let mut team = alpha(false, fixed_clock());
        team.start_estimation().unwrap();
        team.submit_estimate("B", Estimate::Value(5.0)).unwrap();
        team.submit_estimate("C", Estimate::Value(8.0)).unwrap();
        let mut copy = EstimationResult::clone(team.last_result().unwrap());

        // Act
        let outcome = copy.set_estimate("B", Some(Estimate::Value(1.0)));

        // Assert
        assert!(matches!(outcome, Err(DomainError::IllegalTransition(_))));
    }

    #[test]
    fn test_scrum_master_votes_by_default() {
        // Arrange
        let mut team = alpha(true, fixed_clock());
        team.start_estimation().unwrap();

        // Act
        team.submit_estimate("B", Estimate::Value(5.0)).unwrap();
        team.submit_estimate("C", Estimate::Value(8.0)).unwrap();

        // Assert
        assert_eq!(team.state(), RoundState::Estimating);
        assert_eq!(team.estimation_participants().count(), 3);
        team.submit_estimate("A", Estimate::Unknown).unwrap();
        assert_eq!(team.state(), RoundState::Idle);
        assert_eq!(team.last_result().unwrap().average(), Some(6.5));
    }

    #[test]
    fn test_start_estimation_twice_is_an_illegal_transition() {
        let mut team = alpha(true, fixed_clock());
        team.start_estimation().unwrap();

        let result = team.start_estimation();

        assert!(matches!(result, Err(DomainError::IllegalTransition(_))));
    }

    #[test]
    fn test_start_estimation_without_voters_is_an_illegal_transition() {
        let mut team =
            ScrumTeam::create("Alpha", "A", settings(false), fixed_clock()).unwrap();
        team.join("Watcher", Role::Observer).unwrap();

        let result = team.start_estimation();

        assert!(matches!(result, Err(DomainError::IllegalTransition(_))));
        assert_eq!(team.state(), RoundState::Idle);
    }

    #[test]
    fn test_submit_estimate_rejections() {
        // Arrange
        let mut team = alpha(false, fixed_clock());
        team.join("Watcher", Role::Observer).unwrap();

        // Act / Assert
        assert!(matches!(
            team.submit_estimate("B", Estimate::Value(5.0)),
            Err(DomainError::IllegalTransition(_))
        ));

        team.start_estimation().unwrap();
        team.join("Late", Role::Member).unwrap();

        assert!(matches!(
            team.submit_estimate("Watcher", Estimate::Value(5.0)),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            team.submit_estimate("Late", Estimate::Value(5.0)),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            team.submit_estimate("B", Estimate::Value(7.0)),
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            team.submit_estimate("Nobody", Estimate::Value(5.0)),
            Err(DomainError::ParticipantNotFound { .. })
        ));

        team.submit_estimate("b", Estimate::Value(5.0)).unwrap();
        assert!(matches!(
            team.submit_estimate("B", Estimate::Value(8.0)),
            Err(DomainError::Validation(_))
        ));
        assert_eq!(team.participant("B").unwrap().estimate(), Some(Estimate::Value(5.0)));
    }

    #[test]
    fn test_cancel_estimation_returns_to_idle_and_notifies_everyone() {
        // Arrange
        let mut team = alpha(false, fixed_clock());
        team.start_estimation().unwrap();
        team.submit_estimate("B", Estimate::Value(5.0)).unwrap();

        // Act
        team.cancel_estimation().unwrap();

        // Assert
        assert_eq!(team.state(), RoundState::Idle);
        assert_eq!(team.participant("B").unwrap().estimate(), None);
        assert!(team.last_result().is_none());
        for name in ["A", "B", "C"] {
            let last = team.participant(name).unwrap().messages().last().unwrap();
            assert_eq!(last.message_type(), MessageType::EstimationCanceled);
        }
        assert!(matches!(
            team.cancel_estimation(),
            Err(DomainError::IllegalTransition(_))
        ));
    }

    #[test]
    fn test_scrum_master_disconnect_goes_dormant_and_reconnect_revives() {
        // Arrange
        let mut team = alpha(true, fixed_clock());
        let a_messages_before = message_ids(&team, "A");

        // Act
        team.disconnect("A").unwrap();

        // Assert
        let a = team.participant("A").unwrap();
        assert!(a.is_dormant());
        assert_eq!(message_ids(&team, "A"), a_messages_before);
        assert_eq!(
            message_types(&team, "B").last(),
            Some(&MessageType::MemberDisconnected)
        );
        let b_before = message_ids(&team, "B");

        // Act
        let old_session = team.participant("A").unwrap().session_id();
        let connection = team.reconnect("a").unwrap();

        // Assert
        let a = team.participant("A").unwrap();
        assert!(!a.is_dormant());
        assert_ne!(connection.session_id, old_session);
        assert_eq!(connection.session_id, a.session_id());
        assert!(!a.has_message());
        assert_eq!(connection.last_message_id, a.last_message_id());
        let b_after = message_ids(&team, "B");
        assert_eq!(&b_after[..b_before.len()], &b_before[..]);
        assert_eq!(
            message_types(&team, "B").last(),
            Some(&MessageType::MemberJoined)
        );
    }

    #[test]
    fn test_joining_with_dormant_scrum_master_name_revives_it() {
        let mut team = alpha(true, fixed_clock());
        team.disconnect("A").unwrap();

        let connection = team.join("A", Role::ScrumMaster).unwrap();

        assert_eq!(team.participants().len(), 3);
        assert!(!team.participant("A").unwrap().is_dormant());
        assert_eq!(team.participant("A").unwrap().session_id(), connection.session_id);
    }

    #[test]
    fn test_disconnecting_dormant_scrum_master_is_a_no_op() {
        let mut team = alpha(true, fixed_clock());
        team.disconnect("A").unwrap();
        let version = team.version();

        team.disconnect("A").unwrap();

        assert_eq!(team.version(), version);
    }

    #[test]
    fn test_member_disconnect_removes_participant() {
        let mut team = alpha(true, fixed_clock());

        team.disconnect("C").unwrap();

        assert!(team.participant("C").is_none());
        assert_eq!(
            message_types(&team, "B").last(),
            Some(&MessageType::MemberDisconnected)
        );
        assert!(matches!(
            team.disconnect("C"),
            Err(DomainError::ParticipantNotFound { .. })
        ));
    }

    #[test]
    fn test_departure_of_last_missing_voter_closes_round() {
        // Arrange
        let mut team = alpha(false, fixed_clock());
        team.start_estimation().unwrap();
        team.submit_estimate("B", Estimate::Value(5.0)).unwrap();

        // Act
        team.disconnect("C").unwrap();

        // Assert
        assert_eq!(team.state(), RoundState::Idle);
        let result = team.last_result().unwrap();
        assert_eq!(result.entries().len(), 2);
        assert_eq!(result.estimate_of("B"), Some(Estimate::Value(5.0)));
        assert_eq!(result.estimate_of("C"), None);
        assert_eq!(
            message_types(&team, "B")[message_types(&team, "B").len() - 2..],
            [MessageType::MemberDisconnected, MessageType::EstimationEnded]
        );
    }

    #[test]
    fn test_departed_voter_keeps_submitted_estimate_in_result() {
        let mut team = alpha(false, fixed_clock());
        team.start_estimation().unwrap();
        team.submit_estimate("C", Estimate::Value(3.0)).unwrap();
        team.disconnect("C").unwrap();
        assert_eq!(team.state(), RoundState::Estimating);

        team.submit_estimate("B", Estimate::Value(5.0)).unwrap();

        let result = team.last_result().unwrap();
        assert_eq!(result.estimate_of("C"), Some(Estimate::Value(3.0)));
        assert_eq!(result.sum(), Some(8.0));
    }

    #[test]
    fn test_acknowledge_messages_is_idempotent() {
        // Arrange
        let mut team = alpha(false, fixed_clock());
        team.start_estimation().unwrap();
        let session_id = team.participant("A").unwrap().session_id();

        // Act
        team.acknowledge_messages("A", session_id, 2).unwrap();
        let version = team.version();
        team.acknowledge_messages("A", session_id, 2).unwrap();
        team.acknowledge_messages("A", session_id, 1).unwrap();

        // Assert
        assert_eq!(team.version(), version);
        assert_eq!(message_ids(&team, "A"), vec![3]);
        assert_eq!(team.participant("A").unwrap().acknowledged_message_id(), 2);
    }

    #[test]
    fn test_acknowledge_with_stale_session_fails_after_reconnect() {
        // Arrange
        let mut team = alpha(false, fixed_clock());
        let stale = team.participant("B").unwrap().session_id();
        team.reconnect("B").unwrap();
        team.start_estimation().unwrap();

        // Act
        let result = team.acknowledge_messages("B", stale, 10);

        // Assert
        assert!(matches!(result, Err(DomainError::InvalidSession { .. })));
        assert_eq!(message_types(&team, "B"), vec![MessageType::EstimationStarted]);
    }

    #[test]
    fn test_message_ids_keep_increasing_after_reconnect() {
        let mut team = alpha(false, fixed_clock());
        team.start_estimation().unwrap();
        let before = team.participant("B").unwrap().last_message_id();

        let connection = team.reconnect("B").unwrap();
        team.cancel_estimation().unwrap();

        assert_eq!(connection.last_message_id, before);
        assert_eq!(message_ids(&team, "B"), vec![before + 1]);
    }

    #[test]
    fn test_timer_lifecycle() {
        // Arrange
        let mut team = alpha(false, fixed_clock());
        let end_time = start_time() + Duration::minutes(2);
        assert!(matches!(
            team.start_timer(end_time),
            Err(DomainError::IllegalTransition(_))
        ));
        team.start_estimation().unwrap();

        // Act
        team.start_timer(end_time).unwrap();

        // Assert
        assert_eq!(team.timer_end_time(), Some(end_time));
        let last = team.participant("C").unwrap().messages().last().unwrap();
        assert_eq!(last.timer_end_time(), Some(end_time));

        team.cancel_timer().unwrap();
        assert_eq!(team.timer_end_time(), None);
        assert_eq!(
            message_types(&team, "C").last(),
            Some(&MessageType::TimerCanceled)
        );
        assert!(matches!(
            team.cancel_timer(),
            Err(DomainError::IllegalTransition(_))
        ));
    }

    #[test]
    fn test_timer_in_the_past_is_rejected() {
        let mut team = alpha(false, fixed_clock());
        team.start_estimation().unwrap();

        let result = team.start_timer(start_time() - Duration::seconds(1));

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert_eq!(team.timer_end_time(), None);
    }

    #[test]
    fn test_round_close_clears_timer() {
        let mut team = alpha(false, fixed_clock());
        team.start_estimation().unwrap();
        team.start_timer(start_time() + Duration::minutes(1)).unwrap();

        team.submit_estimate("B", Estimate::Value(1.0)).unwrap();
        team.submit_estimate("C", Estimate::Value(2.0)).unwrap();

        assert_eq!(team.timer_end_time(), None);
    }

    #[test]
    fn test_change_deck_only_between_rounds() {
        // Arrange
        let mut team = alpha(false, fixed_clock());
        let fibonacci = Deck::Fibonacci.estimates();

        // Act
        team.change_deck(fibonacci.clone()).unwrap();

        // Assert
        assert_eq!(team.deck(), &fibonacci[..]);
        let last = team.participant("B").unwrap().messages().last().unwrap();
        assert_eq!(last.message_type(), MessageType::AvailableEstimationsChanged);
        assert_eq!(last.deck(), Some(&fibonacci[..]));

        team.start_estimation().unwrap();
        assert!(matches!(
            team.change_deck(Deck::Standard.estimates()),
            Err(DomainError::IllegalTransition(_))
        ));
        assert!(matches!(
            team.submit_estimate("B", Estimate::Value(20.0)),
            Err(DomainError::Validation(_))
        ));
        team.submit_estimate("B", Estimate::Value(21.0)).unwrap();
    }

    #[test]
    fn test_disconnect_inactive_reaps_idle_participants() {
        // Arrange
        let clock = Arc::new(ManualClock::new(start_time()));
        let mut team = alpha(true, clock.clone());
        clock.advance(Duration::minutes(10));
        team.update_activity("B").unwrap();
        clock.advance(Duration::minutes(10));

        // Act
        let reaped = team.disconnect_inactive(Duration::minutes(15));

        // Assert
        assert_eq!(reaped, vec!["A".to_owned(), "C".to_owned()]);
        assert!(team.participant("A").unwrap().is_dormant());
        assert!(team.participant("C").is_none());
        assert!(!team.is_abandoned());

        clock.advance(Duration::minutes(30));
        assert_eq!(team.disconnect_inactive(Duration::minutes(15)), vec!["B".to_owned()]);
        assert!(team.is_abandoned());
    }

    #[test]
    fn test_activity_from_dormant_scrum_master_announces_return() {
        let mut team = alpha(true, fixed_clock());
        team.disconnect("A").unwrap();

        team.update_activity("A").unwrap();

        assert!(!team.participant("A").unwrap().is_dormant());
        assert_eq!(
            message_types(&team, "C").last(),
            Some(&MessageType::MemberJoined)
        );
    }

    #[test]
    fn test_replica_reaches_same_state_from_events() {
        // Arrange
        let mut origin = alpha(false, fixed_clock());
        origin.start_estimation().unwrap();
        origin.submit_estimate("B", Estimate::Value(5.0)).unwrap();
        origin.disconnect("A").unwrap();
        origin.submit_estimate("C", Estimate::Infinity).unwrap();
        let events = origin.take_uncommitted_events();

        // Act
        let replica_clock: Arc<dyn Clock> =
            Arc::new(FixedClock(start_time() + Duration::hours(3)));
        let mut replica = ScrumTeam::from_created_event(&events[0], replica_clock).unwrap();
        for event in &events[1..] {
            replica.apply_remote(event).unwrap();
        }

        // Assert
        assert_eq!(replica.version(), origin.version());
        assert_eq!(replica.state(), origin.state());
        assert!(replica.uncommitted_events().is_empty());
        for (left, right) in origin.participants().iter().zip(replica.participants()) {
            assert_eq!(left.name(), right.name());
            assert_eq!(left.session_id(), right.session_id());
            assert_eq!(left.is_dormant(), right.is_dormant());
            assert_eq!(left.last_activity(), right.last_activity());
            assert_eq!(
                left.messages().map(Message::id).collect::<Vec<_>>(),
                right.messages().map(Message::id).collect::<Vec<_>>()
            );
        }
        assert_eq!(
            replica.last_result().map(|r| r.as_ref().clone()),
            origin.last_result().map(|r| r.as_ref().clone())
        );
    }

    #[test]
    fn test_apply_remote_ignores_duplicates_and_rejects_gaps() {
        // Arrange
        let mut origin = alpha(false, fixed_clock());
        origin.start_estimation().unwrap();
        origin.cancel_estimation().unwrap();
        let events = origin.take_uncommitted_events();
        let mut replica = ScrumTeam::from_created_event(&events[0], fixed_clock()).unwrap();

        // Act
        let gap = replica.apply_remote(&events[2]);
        replica.apply_remote(&events[1]).unwrap();
        replica.apply_remote(&events[1]).unwrap();

        // Assert
        match gap {
            Err(DomainError::ConcurrencyConflict { expected, actual, .. }) => {
                assert_eq!(expected, 2);
                assert_eq!(actual, 3);
            }
            other => panic!("expected ConcurrencyConflict, got {other:?}"),
        }
        assert_eq!(replica.version(), 2);
        assert_eq!(replica.participants().len(), 2);
    }

    fn replica_of(events: &[TeamEvent]) -> ScrumTeam {
        let mut replica = ScrumTeam::from_created_event(&events[0], fixed_clock()).unwrap();
        for event in &events[1..] {
            replica.apply_remote(event).unwrap();
        }
        replica
    }

    #[test]
    fn test_apply_remote_rejects_different_event_at_same_position() {
        // Arrange
        let mut origin = alpha(false, fixed_clock());
        origin.start_estimation().unwrap();
        let events = origin.take_uncommitted_events();
        let mut left = replica_of(&events);
        let mut right = replica_of(&events);
        left.submit_estimate("B", Estimate::Value(5.0)).unwrap();
        right.submit_estimate("C", Estimate::Value(8.0)).unwrap();
        let from_left = left.take_uncommitted_events();
        let from_right = right.take_uncommitted_events();

        // Act
        let on_left = left.apply_remote(&from_right[0]);
        let on_right = right.apply_remote(&from_left[0]);

        // Assert
        for outcome in [on_left, on_right] {
            match outcome {
                Err(DomainError::ConcurrencyConflict { expected, actual, .. }) => {
                    assert_eq!(expected, 6);
                    assert_eq!(actual, 5);
                }
                other => panic!("expected ConcurrencyConflict, got {other:?}"),
            }
        }
        assert_eq!(left.version(), 5);
        assert_eq!(left.participant("C").unwrap().estimate(), None);
        assert_eq!(right.participant("B").unwrap().estimate(), None);
    }

    #[test]
    fn test_apply_remote_rejects_team_created_twice_on_different_nodes() {
        // Arrange
        let mut here = ScrumTeam::create("Alpha", "A", TeamSettings::default(), fixed_clock()).unwrap();
        let mut there = ScrumTeam::create("Alpha", "Z", TeamSettings::default(), fixed_clock()).unwrap();
        let remote = there.take_uncommitted_events();

        // Act
        let outcome = here.apply_remote(&remote[0]);

        // Assert
        assert!(matches!(outcome, Err(DomainError::ConcurrencyConflict { .. })));
        assert_eq!(here.scrum_master().unwrap().name(), "A");
    }

    #[test]
    fn test_applied_event_history_is_bounded() {
        // Arrange
        let mut team = alpha(false, fixed_clock());
        let first = team.take_uncommitted_events()[0].metadata.event_id;
        assert_eq!(team.applied_event_id(1), Some(first));

        // Act
        for _ in 0..APPLIED_EVENT_HISTORY {
            team.update_activity("B").unwrap();
        }

        // Assert
        assert_eq!(team.applied_events.len(), APPLIED_EVENT_HISTORY);
        assert_eq!(team.applied_event_id(1), None);
        assert_eq!(
            team.applied_event_id(team.version()),
            team.uncommitted_events().last().map(|event| event.metadata.event_id)
        );
    }

    #[test]
    fn test_from_created_event_rejects_other_events() {
        let mut origin = alpha(false, fixed_clock());
        let events = origin.take_uncommitted_events();

        let result = ScrumTeam::from_created_event(&events[1], fixed_clock());

        assert!(matches!(result, Err(DomainError::Reconstruction(_))));
    }
}
