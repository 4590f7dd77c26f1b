//! Commands for the Scrum team context.

use chrono::Duration;
use planning_poker_core::command::Command;
use uuid::Uuid;

use super::estimate::Estimate;
use super::participant::Role;

/// Command to create a team with its Scrum Master.
#[derive(Debug, Clone)]
pub struct CreateTeam {
    /// The new team's name.
    pub team_name: String,
    /// The Scrum Master's name.
    pub scrum_master: String,
    /// Cards for the team; the standard deck when `None`.
    pub deck: Option<Vec<Estimate>>,
}

impl Command for CreateTeam {
    fn command_type(&self) -> &'static str {
        "team.create"
    }

    fn team_name(&self) -> &str {
        &self.team_name
    }
}

/// Command to join a team as a member or observer.
#[derive(Debug, Clone)]
pub struct JoinTeam {
    /// The team to join.
    pub team_name: String,
    /// The participant's name.
    pub participant: String,
    /// The participant's role.
    pub role: Role,
}

impl Command for JoinTeam {
    fn command_type(&self) -> &'static str {
        "team.join"
    }

    fn team_name(&self) -> &str {
        &self.team_name
    }
}

/// Command to open a new session for an existing participant.
#[derive(Debug, Clone)]
pub struct ReconnectTeam {
    /// The team.
    pub team_name: String,
    /// The participant's name.
    pub participant: String,
}

impl Command for ReconnectTeam {
    fn command_type(&self) -> &'static str {
        "team.reconnect"
    }

    fn team_name(&self) -> &str {
        &self.team_name
    }
}

/// Command to disconnect a participant.
#[derive(Debug, Clone)]
pub struct DisconnectMember {
    /// The team.
    pub team_name: String,
    /// The participant's name.
    pub participant: String,
}

impl Command for DisconnectMember {
    fn command_type(&self) -> &'static str {
        "team.disconnect"
    }

    fn team_name(&self) -> &str {
        &self.team_name
    }
}

/// Command to open an estimation round.
#[derive(Debug, Clone)]
pub struct StartEstimation {
    /// The team.
    pub team_name: String,
}

impl Command for StartEstimation {
    fn command_type(&self) -> &'static str {
        "team.start_estimation"
    }

    fn team_name(&self) -> &str {
        &self.team_name
    }
}

/// Command to cancel the open round.
#[derive(Debug, Clone)]
pub struct CancelEstimation {
    /// The team.
    pub team_name: String,
}

impl Command for CancelEstimation {
    fn command_type(&self) -> &'static str {
        "team.cancel_estimation"
    }

    fn team_name(&self) -> &str {
        &self.team_name
    }
}

/// Command to play a card in the open round.
#[derive(Debug, Clone)]
pub struct SubmitEstimate {
    /// The team.
    pub team_name: String,
    /// The member's name.
    pub participant: String,
    /// The card played.
    pub estimate: Estimate,
}

impl Command for SubmitEstimate {
    fn command_type(&self) -> &'static str {
        "team.submit_estimate"
    }

    fn team_name(&self) -> &str {
        &self.team_name
    }
}

/// Command to start a countdown for the open round.
#[derive(Debug, Clone)]
pub struct StartTimer {
    /// The team.
    pub team_name: String,
    /// How long the countdown runs from now.
    pub duration: Duration,
}

impl Command for StartTimer {
    fn command_type(&self) -> &'static str {
        "team.start_timer"
    }

    fn team_name(&self) -> &str {
        &self.team_name
    }
}

/// Command to stop the running countdown.
#[derive(Debug, Clone)]
pub struct CancelTimer {
    /// The team.
    pub team_name: String,
}

impl Command for CancelTimer {
    fn command_type(&self) -> &'static str {
        "team.cancel_timer"
    }

    fn team_name(&self) -> &str {
        &self.team_name
    }
}

/// Command to switch the team's deck between rounds.
#[derive(Debug, Clone)]
pub struct ChangeDeck {
    /// The team.
    pub team_name: String,
    /// The new cards.
    pub deck: Vec<Estimate>,
}

impl Command for ChangeDeck {
    fn command_type(&self) -> &'static str {
        "team.change_deck"
    }

    fn team_name(&self) -> &str {
        &self.team_name
    }
}

/// Command to confirm delivery of a participant's messages.
#[derive(Debug, Clone)]
pub struct AcknowledgeMessages {
    /// The team.
    pub team_name: String,
    /// The participant's name.
    pub participant: String,
    /// The session reading the queue.
    pub session_id: Uuid,
    /// Highest message id the client has consumed.
    pub last_message_id: u64,
}

impl Command for AcknowledgeMessages {
    fn command_type(&self) -> &'static str {
        "team.acknowledge_messages"
    }

    fn team_name(&self) -> &str {
        &self.team_name
    }
}
