//! Domain layer for the Scrum team context.

pub mod aggregates;
pub mod commands;
pub mod estimate;
pub mod estimation_result;
pub mod events;
pub mod message;
pub mod participant;
pub mod queue;
pub mod snapshot;
