//! Aggregate root abstraction.

use crate::error::DomainError;
use crate::event::DomainEvent;

/// Trait for aggregate roots that record every accepted change as an event.
///
/// Commands validate and then apply their own event locally; peers replay the
/// same event through [`AggregateRoot::apply_remote`] without re-validation.
pub trait AggregateRoot: Send + Sync {
    /// The event type this aggregate produces and consumes.
    type Event: DomainEvent;

    /// Returns the aggregate identifier.
    fn aggregate_id(&self) -> &str;

    /// Returns the current version (number of events applied).
    fn version(&self) -> i64;

    /// Apply an event to mutate internal state.
    fn apply(&mut self, event: &Self::Event);

    /// Apply an event produced by another node, enforcing stream order only.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ConcurrencyConflict` when the event skips ahead of
    /// the local version.
    fn apply_remote(&mut self, event: &Self::Event) -> Result<(), DomainError>;

    /// Returns uncommitted events produced by command handling.
    fn uncommitted_events(&self) -> &[Self::Event];

    /// Clears uncommitted events after publication.
    fn clear_uncommitted_events(&mut self);
}
