//! Application layer for the Scrum team context.

pub mod command_handlers;
pub mod query_handlers;
pub mod registry;
