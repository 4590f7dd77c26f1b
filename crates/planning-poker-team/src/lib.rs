//! Planning poker Scrum team session engine.
//!
//! Responsible for the team aggregate, its estimation-round state machine,
//! the per-participant acknowledged message queues, snapshots and the
//! application layer that serializes access to each team.

pub mod application;
pub mod domain;
