//! HTTP route modules.

pub mod health;
pub mod messages;
pub mod replication;
pub mod teams;
