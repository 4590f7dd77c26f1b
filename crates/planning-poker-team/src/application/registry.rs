//! Process-wide registry of live teams.
//!
//! Each team sits behind its own `tokio::sync::Mutex`, which is the single
//! serialization point for everything that touches it. The registry map is
//! only locked long enough to clone a team handle out of it; callers never
//! hold the map lock while waiting for a team lock.

use std::collections::HashMap;
use std::sync::Arc;

use planning_poker_core::clock::Clock;
use planning_poker_core::error::DomainError;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, info};

use crate::domain::aggregates::ScrumTeam;

/// Shared handle to one team.
pub type TeamHandle = Arc<Mutex<ScrumTeam>>;

fn key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Team name to team handle, with the clock and role policy new teams get.
pub struct TeamRegistry {
    teams: RwLock<HashMap<String, TeamHandle>>,
    clock: Arc<dyn Clock>,
    scrum_master_votes: bool,
}

impl TeamRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, scrum_master_votes: bool) -> Self {
        Self {
            teams: RwLock::new(HashMap::new()),
            clock,
            scrum_master_votes,
        }
    }

    /// Clock handed to every team created or restored here.
    #[must_use]
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    /// Whether new teams count the Scrum Master as a voter.
    #[must_use]
    pub fn scrum_master_votes(&self) -> bool {
        self.scrum_master_votes
    }

    /// Looks up a team by name, ignoring case.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::TeamNotFound` if no such team is registered.
    pub async fn get(&self, name: &str) -> Result<TeamHandle, DomainError> {
        self.teams
            .read()
            .await
            .get(&key(name))
            .cloned()
            .ok_or_else(|| DomainError::TeamNotFound(name.to_owned()))
    }

    /// Locks a team for exclusive use.
    ///
    /// A team removed or replaced while the caller waited for its lock is
    /// never handed out; the lookup is retried against the current map.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::TeamNotFound` if no such team is registered.
    pub async fn lock(&self, name: &str) -> Result<OwnedMutexGuard<ScrumTeam>, DomainError> {
        loop {
            let handle = self.get(name).await?;
            if let Some(guard) = self.lock_registered(&handle).await {
                return Ok(guard);
            }
            debug!(team = %name, "team changed while waiting for its lock");
        }
    }

    /// Locks `handle` and returns the guard only if the team is still
    /// registered under that handle.
    pub async fn lock_registered(
        &self,
        handle: &TeamHandle,
    ) -> Option<OwnedMutexGuard<ScrumTeam>> {
        let guard = Arc::clone(handle).lock_owned().await;
        let registered = self.is_registered(guard.name(), handle).await;
        registered.then_some(guard)
    }

    async fn is_registered(&self, name: &str, handle: &TeamHandle) -> bool {
        self.teams
            .read()
            .await
            .get(&key(name))
            .is_some_and(|current| Arc::ptr_eq(current, handle))
    }

    /// Registers a newly created team and returns it already locked, so no
    /// other command can run against it before its creation is published.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the name is taken.
    pub async fn insert_new(&self, team: ScrumTeam) -> Result<OwnedMutexGuard<ScrumTeam>, DomainError> {
        let mut teams = self.teams.write().await;
        let key = key(team.name());
        if teams.contains_key(&key) {
            return Err(DomainError::Validation(format!(
                "team {} already exists",
                team.name()
            )));
        }

        let handle = Arc::new(Mutex::new(team));
        let guard = Arc::clone(&handle).lock_owned().await;
        teams.insert(key, handle);
        Ok(guard)
    }

    /// Registers a team, replacing any team with the same name. Used for
    /// snapshot restore and replicated creation.
    pub async fn replace(&self, team: ScrumTeam) -> OwnedMutexGuard<ScrumTeam> {
        let mut teams = self.teams.write().await;
        let key = key(team.name());
        let handle = Arc::new(Mutex::new(team));
        let guard = Arc::clone(&handle).lock_owned().await;
        if teams.insert(key.clone(), handle).is_some() {
            info!(team = %key, "team replaced");
        }
        guard
    }

    /// Drops a team. Returns whether it was registered.
    pub async fn remove(&self, name: &str) -> bool {
        let removed = self.teams.write().await.remove(&key(name)).is_some();
        if removed {
            info!(team = %name, "team removed");
        }
        removed
    }

    /// Drops a team only if it is still registered under `handle`, so a
    /// replacement registered meanwhile survives.
    pub async fn remove_handle(&self, name: &str, handle: &TeamHandle) -> bool {
        let mut teams = self.teams.write().await;
        let key = key(name);
        if !teams
            .get(&key)
            .is_some_and(|current| Arc::ptr_eq(current, handle))
        {
            return false;
        }
        teams.remove(&key);
        info!(team = %name, "team removed");
        true
    }

    /// Handles to every registered team.
    pub async fn teams(&self) -> Vec<TeamHandle> {
        self.teams.read().await.values().cloned().collect()
    }

    /// Number of registered teams.
    pub async fn len(&self) -> usize {
        self.teams.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.teams.read().await.is_empty()
    }
}
