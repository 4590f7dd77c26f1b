//! Environment-driven server configuration.

use std::time::Duration;

use crate::error::AppError;

/// Settings read once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Interface to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
    /// How long a message poll waits before answering with no messages.
    pub poll_timeout: Duration,
    /// Idle time after which a participant is disconnected.
    pub inactivity_timeout: chrono::Duration,
    /// How often the inactivity reaper runs.
    pub reap_interval: Duration,
    /// Whether new teams count the Scrum Master as a voter.
    pub scrum_master_votes: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 3000,
            poll_timeout: Duration::from_secs(60),
            inactivity_timeout: chrono::Duration::seconds(900),
            reap_interval: Duration::from_secs(60),
            scrum_master_votes: true,
        }
    }
}

fn parse<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, AppError>
where
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} is invalid ({raw:?}): {e}"))),
    }
}

fn positive_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: u32,
) -> Result<u32, AppError> {
    let secs = parse(lookup, key, default)?;
    if secs == 0 {
        return Err(AppError::Config(format!("{key} must be greater than zero")));
    }
    Ok(secs)
}

impl AppConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`; unset keys use defaults.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a value cannot be parsed or a duration
    /// is zero.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let defaults = Self::default();
        let host = lookup("HOST").unwrap_or(defaults.host);
        let port = parse(&lookup, "PORT", defaults.port)?;
        let poll_timeout = positive_secs(&lookup, "POLL_TIMEOUT_SECS", 60)?;
        let inactivity_timeout = positive_secs(&lookup, "INACTIVITY_TIMEOUT_SECS", 900)?;
        let reap_interval = positive_secs(&lookup, "REAP_INTERVAL_SECS", 60)?;
        let scrum_master_votes =
            parse(&lookup, "SCRUM_MASTER_VOTES", defaults.scrum_master_votes)?;

        Ok(Self {
            host,
            port,
            poll_timeout: Duration::from_secs(u64::from(poll_timeout)),
            inactivity_timeout: chrono::Duration::seconds(i64::from(inactivity_timeout)),
            reap_interval: Duration::from_secs(u64::from(reap_interval)),
            scrum_master_votes,
        })
    }
}
