use std::env;
use std::str::FromStr;
use std::time::Duration;

use dotenvy::dotenv;

use crate::error::ConfigError;

/// Runtime settings for the order core.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Postgres connection string. `None` binds the in-memory backend.
    pub database_url: Option<String>,
    pub db_connect_timeout: Duration,
    pub db_max_connections: u32,
    /// How long a new order waits before it is confirmed automatically.
    pub confirmation_delay: Duration,
    pub confirmation_queue_capacity: usize,
    /// Longest `create_order` waits for room in a full confirmation queue.
    pub enqueue_timeout: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            db_connect_timeout: Duration::from_millis(3000),
            db_max_connections: 5,
            confirmation_delay: Duration::from_millis(3000),
            confirmation_queue_capacity: 10,
            enqueue_timeout: Duration::from_millis(250),
        }
    }
}

impl CoreConfig {
    /// Reads the configuration from the process environment, loading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup. Unset
    /// variables keep their defaults; blank `DATABASE_URL` counts as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let db_connect_timeout = parse_var(&lookup, "DB_CONNECT_TIMEOUT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.db_connect_timeout);
        let db_max_connections =
            parse_var(&lookup, "DB_MAX_CONNECTIONS")?.unwrap_or(defaults.db_max_connections);
        let confirmation_delay = parse_var(&lookup, "CONFIRMATION_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.confirmation_delay);
        let confirmation_queue_capacity = parse_var(&lookup, "CONFIRMATION_QUEUE_CAPACITY")?
            .unwrap_or(defaults.confirmation_queue_capacity);
        let enqueue_timeout = parse_var(&lookup, "CONFIRMATION_ENQUEUE_TIMEOUT_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.enqueue_timeout);

        if confirmation_queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                var: "CONFIRMATION_QUEUE_CAPACITY",
                reason: "must be greater than zero".to_string(),
            });
        }
        if db_max_connections == 0 {
            return Err(ConfigError::Invalid {
                var: "DB_MAX_CONNECTIONS",
                reason: "must be greater than zero".to_string(),
            });
        }

        let config = Self {
            database_url,
            db_connect_timeout,
            db_max_connections,
            confirmation_delay,
            confirmation_queue_capacity,
            enqueue_timeout,
        };

        // never log the URL itself, it may carry credentials
        tracing::info!(
            database_configured = config.database_url.is_some(),
            confirmation_delay_ms = config.confirmation_delay.as_millis() as u64,
            queue_capacity = config.confirmation_queue_capacity,
            "Configuration loaded"
        );

        Ok(config)
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid { var, reason: e.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = CoreConfig::from_lookup(lookup_from(&[])).unwrap();
        assert!(config.database_url.is_none());
        assert_eq!(config.confirmation_queue_capacity, 10);
        assert_eq!(config.confirmation_delay, Duration::from_secs(3));
    }

    #[test]
    fn reads_overrides() {
        let config = CoreConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/orders"),
            ("CONFIRMATION_DELAY_MS", "150"),
            ("CONFIRMATION_QUEUE_CAPACITY", "32"),
            ("CONFIRMATION_ENQUEUE_TIMEOUT_MS", " 40 "),
        ]))
        .unwrap();

        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/orders"));
        assert_eq!(config.confirmation_delay, Duration::from_millis(150));
        assert_eq!(config.confirmation_queue_capacity, 32);
        assert_eq!(config.enqueue_timeout, Duration::from_millis(40));
    }

    #[test]
    fn blank_database_url_means_in_memory() {
        let config = CoreConfig::from_lookup(lookup_from(&[("DATABASE_URL", "  ")])).unwrap();
        assert!(config.database_url.is_none());
    }

    #[test]
    fn rejects_garbage_and_zero_capacity() {
        let err = CoreConfig::from_lookup(lookup_from(&[("CONFIRMATION_DELAY_MS", "soon")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "CONFIRMATION_DELAY_MS", .. }));

        let err =
            CoreConfig::from_lookup(lookup_from(&[("CONFIRMATION_QUEUE_CAPACITY", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "CONFIRMATION_QUEUE_CAPACITY", .. }));
    }
}
