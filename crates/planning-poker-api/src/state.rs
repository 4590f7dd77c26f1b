//! Shared application state.

use std::sync::Arc;

use planning_poker_core::clock::Clock;
use planning_poker_core::replication::EventPublisher;
use planning_poker_team::application::registry::TeamRegistry;

use crate::config::AppConfig;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Live teams.
    pub registry: Arc<TeamRegistry>,
    /// Outbound replication bus.
    pub publisher: Arc<dyn EventPublisher>,
    /// Startup configuration.
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Create new application state with an empty registry.
    #[must_use]
    pub fn new(config: AppConfig, clock: Arc<dyn Clock>, publisher: Arc<dyn EventPublisher>) -> Self {
        let registry = TeamRegistry::new(clock, config.scrum_master_votes);
        Self {
            registry: Arc::new(registry),
            publisher,
            config: Arc::new(config),
        }
    }
}
