use std::time::Duration;

use pulse_notifications::DEFAULT_FEED_CAPACITY;
use pulse_realtime::config::{DEFAULT_BASE_URL, DEFAULT_WS_PATH};
use pulse_realtime::{RealtimeConfig, ReconnectConfig};

/// Invalid value in the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got {value:?}")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Session configuration loaded from environment variables.
///
/// All fields default to values suitable for local development.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub realtime: RealtimeConfig,
    /// Maximum number of notifications kept in the feed (default: `50`).
    pub feed_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            realtime: RealtimeConfig::default(),
            feed_capacity: DEFAULT_FEED_CAPACITY,
        }
    }
}

impl SessionConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                 |
    /// |--------------------------------|-------------------------|
    /// | `PULSE_API_URL`                | `http://localhost:8000` |
    /// | `PULSE_WS_PATH`                | `/ws/notifications`     |
    /// | `PULSE_HEARTBEAT_SECS`         | `30`                    |
    /// | `PULSE_HANDSHAKE_TIMEOUT_SECS` | `10`                    |
    /// | `PULSE_RECONNECT_BASE_MS`      | `3000`                  |
    /// | `PULSE_MAX_RECONNECT_ATTEMPTS` | `5`                     |
    /// | `PULSE_FEED_CAPACITY`          | `50`                    |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Like [`from_env`](Self::from_env) but reading values through
    /// `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let reconnect = &defaults.realtime.reconnect;

        let base_url = lookup("PULSE_API_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into());
        let ws_path = lookup("PULSE_WS_PATH").unwrap_or_else(|| DEFAULT_WS_PATH.into());

        let heartbeat_secs: u64 = parse_var(
            &lookup,
            "PULSE_HEARTBEAT_SECS",
            "a positive integer",
            defaults.realtime.heartbeat_interval.as_secs(),
        )?;
        if heartbeat_secs == 0 {
            return Err(invalid("PULSE_HEARTBEAT_SECS", "a positive integer", "0"));
        }

        let handshake_secs: u64 = parse_var(
            &lookup,
            "PULSE_HANDSHAKE_TIMEOUT_SECS",
            "a positive integer",
            defaults.realtime.handshake_timeout.as_secs(),
        )?;
        if handshake_secs == 0 {
            return Err(invalid("PULSE_HANDSHAKE_TIMEOUT_SECS", "a positive integer", "0"));
        }

        let base_ms: u64 = parse_var(
            &lookup,
            "PULSE_RECONNECT_BASE_MS",
            "a valid u64",
            reconnect.base_interval.as_millis() as u64,
        )?;

        let max_attempts: u32 = parse_var(
            &lookup,
            "PULSE_MAX_RECONNECT_ATTEMPTS",
            "a valid u32",
            reconnect.max_attempts,
        )?;

        let feed_capacity: usize = parse_var(
            &lookup,
            "PULSE_FEED_CAPACITY",
            "a positive integer",
            defaults.feed_capacity,
        )?;
        if feed_capacity == 0 {
            return Err(invalid("PULSE_FEED_CAPACITY", "a positive integer", "0"));
        }

        Ok(Self {
            realtime: RealtimeConfig {
                base_url,
                ws_path,
                heartbeat_interval: Duration::from_secs(heartbeat_secs),
                handshake_timeout: Duration::from_secs(handshake_secs),
                reconnect: ReconnectConfig {
                    base_interval: Duration::from_millis(base_ms),
                    max_attempts,
                    ..reconnect.clone()
                },
            },
            feed_capacity,
        })
    }
}

fn parse_var<F, T>(
    lookup: &F,
    var: &'static str,
    expected: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| invalid(var, expected, &raw)),
    }
}

fn invalid(var: &'static str, expected: &'static str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        var,
        expected,
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = SessionConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.realtime.base_url, "http://localhost:8000");
        assert_eq!(config.realtime.ws_path, "/ws/notifications");
        assert_eq!(config.realtime.heartbeat_interval, Duration::from_secs(30));
        assert_eq!(config.realtime.handshake_timeout, Duration::from_secs(10));
        assert_eq!(config.realtime.reconnect.base_interval, Duration::from_millis(3000));
        assert_eq!(config.realtime.reconnect.max_attempts, 5);
        assert_eq!(config.feed_capacity, 50);
    }

    #[test]
    fn overrides_are_applied() {
        let config = SessionConfig::from_lookup(lookup(&[
            ("PULSE_API_URL", "https://api.example.com"),
            ("PULSE_WS_PATH", "/realtime"),
            ("PULSE_HEARTBEAT_SECS", "10"),
            ("PULSE_HANDSHAKE_TIMEOUT_SECS", "4"),
            ("PULSE_RECONNECT_BASE_MS", " 500 "),
            ("PULSE_MAX_RECONNECT_ATTEMPTS", "8"),
            ("PULSE_FEED_CAPACITY", "20"),
        ]))
        .unwrap();

        assert_eq!(config.realtime.base_url, "https://api.example.com");
        assert_eq!(config.realtime.ws_path, "/realtime");
        assert_eq!(config.realtime.heartbeat_interval, Duration::from_secs(10));
        assert_eq!(config.realtime.handshake_timeout, Duration::from_secs(4));
        assert_eq!(config.realtime.reconnect.base_interval, Duration::from_millis(500));
        assert_eq!(config.realtime.reconnect.max_attempts, 8);
        assert_eq!(config.realtime.reconnect.multiplier, 1.5);
        assert_eq!(config.feed_capacity, 20);
    }

    #[test]
    fn invalid_values_are_reported() {
        let err = SessionConfig::from_lookup(lookup(&[("PULSE_MAX_RECONNECT_ATTEMPTS", "many")]))
            .unwrap_err();
        assert_matches!(
            err,
            ConfigError::Invalid { var: "PULSE_MAX_RECONNECT_ATTEMPTS", ref value, .. } if value == "many"
        );

        let err = SessionConfig::from_lookup(lookup(&[("PULSE_FEED_CAPACITY", "0")])).unwrap_err();
        assert_matches!(err, ConfigError::Invalid { var: "PULSE_FEED_CAPACITY", .. });

        let err = SessionConfig::from_lookup(lookup(&[("PULSE_HEARTBEAT_SECS", "0")])).unwrap_err();
        assert_eq!(
            err.to_string(),
            "PULSE_HEARTBEAT_SECS must be a positive integer, got \"0\""
        );
    }
}
