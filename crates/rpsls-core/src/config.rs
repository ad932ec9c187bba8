//! Client configuration.
//!
//! Defaults match the ledger contract; every value can be overridden from the
//! environment.

use std::time::Duration;
use thiserror::Error;

/// Deadline for joining and for revealing
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5 * 60);
/// How often tracked games are reconciled against the ledger
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
/// Upper bound on a single ledger read during reconciliation
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);
/// Storage key of the persisted game list
pub const DEFAULT_STORAGE_KEY: &str = "rps_game_data";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("{0} must not be empty")]
    Empty(&'static str),
}

/// Game client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub read_timeout: Duration,
    pub storage_key: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            read_timeout: DEFAULT_READ_TIMEOUT,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables
    ///
    /// * `RPSLS_TIMEOUT_SECS`
    /// * `RPSLS_POLL_INTERVAL_MS`
    /// * `RPSLS_READ_TIMEOUT_MS`
    /// * `RPSLS_STORAGE_KEY`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let timeout = duration_var(&lookup, "RPSLS_TIMEOUT_SECS", Duration::from_secs)?
            .unwrap_or(defaults.timeout);
        let poll_interval = duration_var(&lookup, "RPSLS_POLL_INTERVAL_MS", Duration::from_millis)?
            .unwrap_or(defaults.poll_interval);
        let read_timeout = duration_var(&lookup, "RPSLS_READ_TIMEOUT_MS", Duration::from_millis)?
            .unwrap_or(defaults.read_timeout);
        let storage_key = match lookup("RPSLS_STORAGE_KEY") {
            Some(key) if key.trim().is_empty() => return Err(ConfigError::Empty("RPSLS_STORAGE_KEY")),
            Some(key) => key,
            None => defaults.storage_key,
        };

        Ok(Self {
            timeout,
            poll_interval,
            read_timeout,
            storage_key,
        })
    }
}

fn duration_var(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
    unit: fn(u64) -> Duration,
) -> Result<Option<Duration>, ConfigError> {
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    let value: u64 = raw.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        value: raw.clone(),
    })?;
    if value == 0 {
        return Err(ConfigError::Zero(var));
    }
    Ok(Some(unit(value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("RPSLS_TIMEOUT_SECS", "60"),
            ("RPSLS_POLL_INTERVAL_MS", "250"),
            ("RPSLS_STORAGE_KEY", "alice"),
        ]))
        .unwrap();

        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.read_timeout, DEFAULT_READ_TIMEOUT);
        assert_eq!(config.storage_key, "alice");
    }

    #[test]
    fn test_rejects_bad_values() {
        assert_eq!(
            ClientConfig::from_lookup(lookup(&[("RPSLS_TIMEOUT_SECS", "soon")])),
            Err(ConfigError::Invalid {
                var: "RPSLS_TIMEOUT_SECS",
                value: "soon".to_string()
            })
        );
        assert_eq!(
            ClientConfig::from_lookup(lookup(&[("RPSLS_POLL_INTERVAL_MS", "0")])),
            Err(ConfigError::Zero("RPSLS_POLL_INTERVAL_MS"))
        );
        assert_eq!(
            ClientConfig::from_lookup(lookup(&[("RPSLS_STORAGE_KEY", " ")])),
            Err(ConfigError::Empty("RPSLS_STORAGE_KEY"))
        );
    }
}
