//! Manager configuration

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Capacity used when `create_pool` is called without `max_workers`
pub const DEFAULT_MAX_WORKERS: usize = 5;

/// Manager configuration
///
/// # Example
///
/// ```
/// use poolwright_core::ManagerConfig;
/// use std::time::Duration;
///
/// let config = ManagerConfig::default()
///     .with_default_max_workers(8)
///     .with_cleanup_interval(Duration::from_secs(60));
/// assert_eq!(config.default_max_workers, 8);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Capacity for pools created without an explicit one
    pub default_max_workers: usize,

    /// How often the cleanup daemon sweeps terminal tasks and stopped pools
    #[serde(with = "duration_millis")]
    pub cleanup_interval: Duration,

    /// Upper bound on waiting for the cleanup daemon to exit during shutdown
    #[serde(with = "duration_millis")]
    pub cleanup_join_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            default_max_workers: DEFAULT_MAX_WORKERS,
            cleanup_interval: Duration::from_secs(300),
            cleanup_join_timeout: Duration::from_secs(5),
        }
    }
}

impl ManagerConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `POOLWRIGHT_DEFAULT_MAX_WORKERS`: capacity for pools created without one (default: 5)
    /// - `POOLWRIGHT_CLEANUP_INTERVAL_SECS`: cleanup sweep interval (default: 300)
    /// - `POOLWRIGHT_CLEANUP_JOIN_TIMEOUT_SECS`: daemon join timeout on shutdown (default: 5)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            default_max_workers: env_parse("POOLWRIGHT_DEFAULT_MAX_WORKERS")
                .filter(|n: &usize| *n >= 1)
                .unwrap_or(defaults.default_max_workers),
            cleanup_interval: env_parse("POOLWRIGHT_CLEANUP_INTERVAL_SECS")
                .filter(|s: &u64| *s > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.cleanup_interval),
            cleanup_join_timeout: env_parse("POOLWRIGHT_CLEANUP_JOIN_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.cleanup_join_timeout),
        }
    }

    /// Set the default pool capacity (at least 1)
    pub fn with_default_max_workers(mut self, max: usize) -> Self {
        self.default_max_workers = max.max(1);
        self
    }

    /// Set the cleanup sweep interval
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    /// Set the daemon join timeout
    pub fn with_cleanup_join_timeout(mut self, timeout: Duration) -> Self {
        self.cleanup_join_timeout = timeout;
        self
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparsable configuration value");
            None
        }
    }
}

/// Serde support for Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ManagerConfig::default();
        assert_eq!(config.default_max_workers, 5);
        assert_eq!(config.cleanup_interval, Duration::from_secs(300));
        assert_eq!(config.cleanup_join_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_config_builder() {
        let config = ManagerConfig::default()
            .with_default_max_workers(0)
            .with_cleanup_interval(Duration::from_millis(250))
            .with_cleanup_join_timeout(Duration::from_secs(1));

        // Capacity never drops below one
        assert_eq!(config.default_max_workers, 1);
        assert_eq!(config.cleanup_interval, Duration::from_millis(250));
        assert_eq!(config.cleanup_join_timeout, Duration::from_secs(1));
    }

    #[test]
    fn test_config_serializes_durations_as_millis() {
        let config = ManagerConfig::default();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["cleanup_interval"], 300_000);

        let back: ManagerConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }
}
