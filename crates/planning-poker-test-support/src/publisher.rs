//! Mock `EventPublisher` implementations for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use planning_poker_core::error::DomainError;
use planning_poker_core::replication::{EventPublisher, PublishedEvent};

/// A publisher that records every batch it is handed and always succeeds.
#[derive(Debug, Default)]
pub struct RecordingEventPublisher {
    published: Mutex<Vec<Vec<PublishedEvent>>>,
}

impl RecordingEventPublisher {
    /// Create an empty recording publisher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all published batches, in publication order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn published_batches(&self) -> Vec<Vec<PublishedEvent>> {
        self.published.lock().unwrap().clone()
    }

    /// Returns all published events flattened, in publication order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn published_events(&self) -> Vec<PublishedEvent> {
        self.published.lock().unwrap().iter().flatten().cloned().collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(&self, events: &[PublishedEvent]) -> Result<(), DomainError> {
        self.published.lock().unwrap().push(events.to_vec());
        Ok(())
    }
}

/// A publisher that always returns an infrastructure error. Useful for
/// testing that a bus outage does not fail the local command.
#[derive(Debug)]
pub struct FailingEventPublisher;

#[async_trait]
impl EventPublisher for FailingEventPublisher {
    async fn publish(&self, _events: &[PublishedEvent]) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("bus unavailable".into()))
    }
}
