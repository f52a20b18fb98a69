//! Server configuration loaded from environment variables

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::deck::{self, CardPack};
use crate::types::{GameSettings, MIN_PLAYERS};

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    InvalidVar { name: &'static str, value: String },

    #[error("Failed to load card packs: {0}")]
    CardPacks(String),
}

/// Default port, "CA" in ascii
const DEFAULT_PORT: u16 = 6765;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// JSON file with card packs; the built-in pack is used when unset
    pub card_packs_path: Option<PathBuf>,
    /// Settings every new lobby starts with
    pub default_settings: GameSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            card_packs_path: None,
            default_settings: GameSettings::default(),
        }
    }
}

impl ServerConfig {
    /// Load config from environment variables, falling back to defaults for unset ones
    pub fn from_env() -> ConfigResult<Self> {
        let defaults = Self::default();
        let settings = defaults.default_settings;

        let port = parse_var::<u16>("PORT")?.unwrap_or(DEFAULT_PORT);

        let card_packs_path = std::env::var("CARD_PACKS_PATH")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let default_settings = GameSettings {
            winning_score: parse_var::<u32>("WINNING_SCORE")?.unwrap_or(settings.winning_score),
            max_players: parse_var::<usize>("MAX_PLAYERS")?.unwrap_or(settings.max_players),
            winner_screen_display_time: parse_var::<u64>("WINNER_SCREEN_MS")?
                .map(Duration::from_millis)
                .unwrap_or(settings.winner_screen_display_time),
            submission_time_limit: parse_var::<u64>("SUBMISSION_TIME_LIMIT_SECS")?
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            enabled_packs: settings.enabled_packs,
        };

        if default_settings.winning_score == 0 {
            return Err(ConfigError::InvalidVar {
                name: "WINNING_SCORE",
                value: "0".to_string(),
            });
        }

        if default_settings.max_players < MIN_PLAYERS {
            return Err(ConfigError::InvalidVar {
                name: "MAX_PLAYERS",
                value: default_settings.max_players.to_string(),
            });
        }

        Ok(Self {
            addr: SocketAddr::from(([0, 0, 0, 0], port)),
            card_packs_path,
            default_settings,
        })
    }

    /// Load the configured card packs, or the built-in pack
    pub fn load_packs(&self) -> ConfigResult<Vec<CardPack>> {
        match &self.card_packs_path {
            Some(path) => deck::load_packs(path),
            None => {
                tracing::warn!("CARD_PACKS_PATH not set, using the built-in card pack");
                Ok(deck::builtin_packs())
            }
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str) -> ConfigResult<Option<T>> {
    match std::env::var(name) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidVar { name, value }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "PORT",
        "CARD_PACKS_PATH",
        "WINNING_SCORE",
        "MAX_PLAYERS",
        "WINNER_SCREEN_MS",
        "SUBMISSION_TIME_LIMIT_SECS",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    fn set_env(name: &str, value: &str) {
        std::env::set_var(name, value);
    }

    #[test]
    #[serial]
    fn test_defaults_without_env() {
        clear_env();
        let config = ServerConfig::from_env().unwrap();

        assert_eq!(config.addr.port(), DEFAULT_PORT);
        assert!(config.card_packs_path.is_none());
        assert_eq!(config.default_settings, GameSettings::default());
    }

    #[test]
    #[serial]
    fn test_reads_overrides() {
        clear_env();
        set_env("PORT", "9000");
        set_env("WINNING_SCORE", "3");
        set_env("MAX_PLAYERS", "6");
        set_env("WINNER_SCREEN_MS", "1500");
        set_env("SUBMISSION_TIME_LIMIT_SECS", "45");
        set_env("CARD_PACKS_PATH", "/tmp/packs.json");

        let config = ServerConfig::from_env().unwrap();
        clear_env();

        assert_eq!(config.addr.port(), 9000);
        assert_eq!(config.default_settings.winning_score, 3);
        assert_eq!(config.default_settings.max_players, 6);
        assert_eq!(
            config.default_settings.winner_screen_display_time,
            Duration::from_millis(1500)
        );
        assert_eq!(
            config.default_settings.submission_time_limit,
            Some(Duration::from_secs(45))
        );
        assert_eq!(config.card_packs_path, Some(PathBuf::from("/tmp/packs.json")));
    }

    #[test]
    #[serial]
    fn test_rejects_garbage() {
        clear_env();
        set_env("MAX_PLAYERS", "lots");
        let result = ServerConfig::from_env();
        clear_env();

        assert!(matches!(
            result,
            Err(ConfigError::InvalidVar {
                name: "MAX_PLAYERS",
                ..
            })
        ));
    }

    #[test]
    #[serial]
    fn test_rejects_zero_winning_score() {
        clear_env();
        set_env("WINNING_SCORE", "0");
        let result = ServerConfig::from_env();
        clear_env();

        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_rejects_max_players_below_minimum() {
        clear_env();
        set_env("MAX_PLAYERS", "0");
        let zero = ServerConfig::from_env();
        set_env("MAX_PLAYERS", "2");
        let two = ServerConfig::from_env();
        set_env("MAX_PLAYERS", "3");
        let three = ServerConfig::from_env();
        clear_env();

        assert!(matches!(
            zero,
            Err(ConfigError::InvalidVar {
                name: "MAX_PLAYERS",
                ..
            })
        ));
        assert!(two.is_err());
        assert_eq!(three.unwrap().default_settings.max_players, 3);
    }

    #[test]
    #[serial]
    fn test_builtin_packs_when_unset() {
        clear_env();
        let config = ServerConfig::from_env().unwrap();
        let packs = config.load_packs().unwrap();
        assert!(!packs.is_empty());
        assert!(!packs[0].white.is_empty());
    }
}
