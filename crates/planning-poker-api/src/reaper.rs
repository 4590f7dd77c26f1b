//! Background task that disconnects idle participants.

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::info;

use planning_poker_team::application::command_handlers::{self, ReapReport};

use crate::state::AppState;

/// Runs one reaping pass over every team.
pub async fn reap_once(state: &AppState) -> ReapReport {
    let report = command_handlers::handle_reap_inactive(
        &state.registry,
        &*state.publisher,
        state.config.inactivity_timeout,
    )
    .await;

    if !report.disconnected.is_empty() || !report.removed_teams.is_empty() {
        info!(
            disconnected = report.disconnected.len(),
            removed_teams = report.removed_teams.len(),
            "inactivity reaper pass finished"
        );
    }
    report
}

/// Spawns the reaper on the current runtime, ticking every
/// `config.reap_interval`.
pub fn spawn(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(state.config.reap_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            reap_once(&state).await;
        }
    })
}
