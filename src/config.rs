//! Environment-driven configuration

use crate::error::ConfigError;
use crate::types::Settings;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Read and parse an environment variable. Unset or blank yields `Ok(None)`.
fn env_value<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    let Ok(raw) = std::env::var(key) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed.parse().map(Some).map_err(|_| ConfigError::Invalid {
        key: key.to_string(),
        value: raw.clone(),
    })
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env_value(key) {
        Ok(Some(value)) => value,
        Ok(None) => default,
        Err(e) => {
            tracing::warn!("{}, using default", e);
            default
        }
    }
}

/// Coordinator-side game configuration
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Initial per-phase timer in seconds (0 = disabled)
    pub round_timer_seconds: u32,
    pub max_dare_chars: usize,
    pub max_name_chars: usize,
    /// How long after a peer is detected it receives its first snapshot
    pub welcome_delay: Duration,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            round_timer_seconds: 0,
            max_dare_chars: 280,
            max_name_chars: 32,
            welcome_delay: Duration::from_millis(500),
        }
    }
}

impl GameConfig {
    /// Load config from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            round_timer_seconds: env_or("WHODARES_ROUND_TIMER", defaults.round_timer_seconds),
            max_dare_chars: env_or("WHODARES_MAX_DARE_CHARS", defaults.max_dare_chars),
            max_name_chars: env_or("WHODARES_MAX_NAME_CHARS", defaults.max_name_chars),
            welcome_delay: env_value::<u64>("WHODARES_WELCOME_DELAY_MS")
                .unwrap_or_else(|e| {
                    tracing::warn!("{}, using default", e);
                    None
                })
                .map(Duration::from_millis)
                .unwrap_or(defaults.welcome_delay),
        }
    }

    /// Settings a new game starts with
    pub fn initial_settings(&self) -> Settings {
        Settings {
            round_timer: self.round_timer_seconds,
            max_dare_chars: self.max_dare_chars,
            ..Settings::default()
        }
    }
}

/// Relay configuration, for the server and for clients connecting to it
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind: SocketAddr,
    /// WebSocket endpoint clients connect to
    pub url: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 6574)),
            url: "ws://127.0.0.1:6574/ws".to_string(),
        }
    }
}

impl RelayConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bind: env_or("WHODARES_BIND", defaults.bind),
            url: env_or("WHODARES_RELAY_URL", defaults.url),
        }
    }
}
