//! Replication bus abstraction.
//!
//! The bus itself (topics, retries, delivery counts) lives outside this
//! workspace. The engine only hands it already-validated team events in team
//! order and accepts the same envelopes back from peers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Wire representation of a team event travelling between nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Team this event belongs to.
    pub team_name: String,
    /// Event type name for deserialization routing.
    pub event_type: String,
    /// Serialized event payload.
    pub payload: serde_json::Value,
    /// Sequence number within the team stream.
    pub sequence_number: i64,
    /// Timestamp of event creation.
    pub occurred_at: DateTime<Utc>,
}

/// Outbound side of the replication bus.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish events of one team, in order.
    async fn publish(&self, events: &[PublishedEvent]) -> Result<(), DomainError>;
}

/// Publisher for single-node deployments; drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(&self, _events: &[PublishedEvent]) -> Result<(), DomainError> {
        Ok(())
    }
}
