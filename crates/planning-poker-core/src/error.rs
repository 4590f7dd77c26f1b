//! Domain error types.

use thiserror::Error;

/// Top-level domain error type.
///
/// Every variant is scoped to a single operation on a single team or
/// participant; none of them is fatal to the process.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A team with the given name is not hosted here.
    #[error("team not found: {0}")]
    TeamNotFound(String),

    /// A participant with the given name is not in the team.
    #[error("participant {name} not found in team {team}")]
    ParticipantNotFound {
        /// The team that was searched.
        team: String,
        /// The missing participant's name.
        name: String,
    },

    /// A validation error in domain logic (bad name, duplicate join, bad estimate).
    #[error("validation error: {0}")]
    Validation(String),

    /// The session is empty or has been superseded by a newer one.
    #[error("invalid session for participant {participant}")]
    InvalidSession {
        /// The participant whose session check failed.
        participant: String,
    },

    /// The operation is not allowed in the team's current round state.
    #[error("illegal transition: {0}")]
    IllegalTransition(String),

    /// A snapshot or replicated event could not be turned back into domain state.
    #[error("reconstruction error: {0}")]
    Reconstruction(String),

    /// A replicated event arrived out of order.
    #[error(
        "concurrency conflict on team {team}: expected sequence {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        /// The team that had the conflict.
        team: String,
        /// The sequence number the team expected next.
        expected: i64,
        /// The sequence number that arrived.
        actual: i64,
    },

    /// An infrastructure error (replication bus, storage).
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}
