//! Configuration module.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

/// Default bound on a single vote round-trip.
pub const DEFAULT_VOTE_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration that could not be parsed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid CIVIC_BIND_ADDR {0:?}")]
    InvalidBindAddr(String),
    #[error("invalid CIVIC_VOTE_TIMEOUT_MS {0:?}")]
    InvalidTimeout(String),
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for the vote authority API (optional in development)
    pub api_psk: Option<String>,
    /// Address to bind the reference authority to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON lines
    pub log_json: bool,
    /// Base URL of the remote vote authority, including the `/api` prefix
    pub authority_url: String,
    /// Upper bound on a vote round-trip before it is rolled back
    pub vote_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables (and `.env` when present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_psk = lookup("CIVIC_API_PSK").filter(|psk| !psk.is_empty());

        let raw_addr = lookup("CIVIC_BIND_ADDR").unwrap_or_else(|| "127.0.0.1:8080".to_string());
        let bind_addr = raw_addr
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddr(raw_addr.clone()))?;

        let log_level = lookup("CIVIC_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let log_json = lookup("CIVIC_LOG_FORMAT")
            .map(|format| format.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let authority_url = lookup("CIVIC_AUTHORITY_URL")
            .unwrap_or_else(|| "http://127.0.0.1:8080/api".to_string());

        let vote_timeout = match lookup("CIVIC_VOTE_TIMEOUT_MS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(ms) if ms > 0 => Duration::from_millis(ms),
                _ => return Err(ConfigError::InvalidTimeout(raw)),
            },
            None => DEFAULT_VOTE_TIMEOUT,
        };

        Ok(Self {
            api_psk,
            bind_addr,
            log_level,
            log_json,
            authority_url,
            vote_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();

        assert!(config.api_psk.is_none());
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
        assert!(!config.log_json);
        assert_eq!(config.authority_url, "http://127.0.0.1:8080/api");
        assert_eq!(config.vote_timeout, DEFAULT_VOTE_TIMEOUT);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("CIVIC_API_PSK", "secret"),
            ("CIVIC_BIND_ADDR", "0.0.0.0:9000"),
            ("CIVIC_LOG_FORMAT", "JSON"),
            ("CIVIC_AUTHORITY_URL", "https://civic.example/api"),
            ("CIVIC_VOTE_TIMEOUT_MS", "2500"),
        ]))
        .unwrap();

        assert_eq!(config.api_psk.as_deref(), Some("secret"));
        assert_eq!(config.bind_addr.port(), 9000);
        assert!(config.log_json);
        assert_eq!(config.authority_url, "https://civic.example/api");
        assert_eq!(config.vote_timeout, Duration::from_millis(2500));
    }

    #[test]
    fn test_empty_psk_disables_auth() {
        let config = Config::from_lookup(lookup_from(&[("CIVIC_API_PSK", "")])).unwrap();
        assert!(config.api_psk.is_none());
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            Config::from_lookup(lookup_from(&[("CIVIC_BIND_ADDR", "nowhere")])),
            Err(ConfigError::InvalidBindAddr(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup_from(&[("CIVIC_VOTE_TIMEOUT_MS", "0")])),
            Err(ConfigError::InvalidTimeout(_))
        ));
    }
}
