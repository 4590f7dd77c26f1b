//! Shared domain abstractions for the planning poker session engine.
//!
//! This crate defines the fundamental traits and types that the team
//! engine and its transports depend on. It contains no infrastructure code.

pub mod aggregate;
pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod replication;
