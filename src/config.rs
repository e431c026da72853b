//! Server configuration from environment variables.

use crate::types::{GameConfig, SessionRules, MAX_SUPPORTED_PLAYERS, MIN_SUPPORTED_PLAYERS};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_REAP_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Directory for JSON session files (None = keep sessions in memory)
    pub data_dir: Option<PathBuf>,
    pub game: GameConfig,
    /// How often finished, cancelled and idle sessions are dropped from memory
    pub reap_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            data_dir: None,
            game: GameConfig::default(),
            reap_interval: Duration::from_secs(DEFAULT_REAP_SECS),
        }
    }
}

/// Read a trimmed, non-empty env var
fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().and_then(|v| {
        let trimmed = v.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

/// Parse an env var, warning and falling back to `default` if it is malformed
fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env_string(key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid value {:?} for {}, using default", raw, key);
            default
        }),
        None => default,
    }
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind_addr = env_parse("MAFIA_BIND_ADDR", defaults.bind_addr);
        let data_dir = env_string("MAFIA_DATA_DIR").map(PathBuf::from);

        let day_secs = env_parse("MAFIA_DAY_SECONDS", defaults.game.day_duration.as_secs());
        let night_secs = env_parse(
            "MAFIA_NIGHT_SECONDS",
            defaults.game.night_duration.as_secs(),
        );
        let reap_secs = env_parse("MAFIA_REAP_SECONDS", DEFAULT_REAP_SECS);
        let idle_secs = env_parse(
            "MAFIA_LOBBY_IDLE_SECONDS",
            defaults.game.lobby_idle_ttl.as_secs(),
        );

        let rules = Self::clamp_rules(
            env_parse("MAFIA_MIN_PLAYERS", defaults.game.rules.min_players),
            env_parse("MAFIA_MAX_PLAYERS", defaults.game.rules.max_players),
        );

        let config = Self {
            bind_addr,
            data_dir,
            game: GameConfig {
                day_duration: Duration::from_secs(day_secs.max(1)),
                night_duration: Duration::from_secs(night_secs.max(1)),
                rules,
                lobby_idle_ttl: Duration::from_secs(idle_secs.max(1)),
            },
            reap_interval: Duration::from_secs(reap_secs.max(1)),
        };

        tracing::info!(
            bind_addr = %config.bind_addr,
            persistent = config.data_dir.is_some(),
            day_secs = config.game.day_duration.as_secs(),
            night_secs = config.game.night_duration.as_secs(),
            lobby_idle_secs = config.game.lobby_idle_ttl.as_secs(),
            min_players = config.game.rules.min_players,
            max_players = config.game.rules.max_players,
            "Server config loaded"
        );
        config
    }

    /// Keep player limits inside what role assignment supports
    fn clamp_rules(min: usize, max: usize) -> SessionRules {
        let min_players = min.clamp(MIN_SUPPORTED_PLAYERS, MAX_SUPPORTED_PLAYERS);
        let max_players = max.clamp(min_players, MAX_SUPPORTED_PLAYERS);
        if min_players != min || max_players != max {
            tracing::warn!(
                min_players,
                max_players,
                "Player limits adjusted to the supported range"
            );
        }
        SessionRules {
            min_players,
            max_players,
        }
    }
}
