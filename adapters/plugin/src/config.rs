//! TOML configuration for the plugin.

use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use enemy_down_core::{GAME_DURATION_SECS, SPAWN_OFFSET_RADIUS, TICK_INTERVAL_SECS};
use enemy_down_system_spawning::Config as SpawningConfig;
use enemy_down_world::SessionConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File name used for the score store when none is configured.
pub const DEFAULT_STORE_PATH: &str = "enemy-down-scores.jsonl";

/// Failures raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration at {path}: {source}")]
    Read {
        /// Location that was read.
        path: PathBuf,
        /// Underlying failure.
        source: io::Error,
    },
    /// The contents are not valid configuration TOML.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    /// A session must last at least one second of game time.
    #[error("game.duration_secs must be greater than zero")]
    ZeroDuration,
    /// Ticks must consume game time, otherwise sessions never end.
    #[error("game.tick_interval_secs must be greater than zero")]
    ZeroTickInterval,
    /// The spawn offset range would be empty.
    #[error("game.spawn_radius must not be negative, got {0}")]
    NegativeSpawnRadius(i32),
}

/// Timing and spawning parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GameConfig {
    /// Game time granted to each session, in seconds.
    pub duration_secs: u32,
    /// Period of the session timer and game time consumed per tick, in seconds.
    pub tick_interval_secs: u32,
    /// Maximum horizontal offset of spawned opponents, in blocks.
    pub spawn_radius: i32,
    /// Fixed RNG seed; spawns are drawn from OS entropy when absent.
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            duration_secs: GAME_DURATION_SECS,
            tick_interval_secs: TICK_INTERVAL_SECS,
            spawn_radius: SPAWN_OFFSET_RADIUS,
            seed: None,
        }
    }
}

impl GameConfig {
    /// Session timing derived from this configuration.
    #[must_use]
    pub fn session(&self) -> SessionConfig {
        SessionConfig::new(self.duration_secs, self.tick_interval_secs)
    }

    /// Spawning system configuration derived from this configuration.
    #[must_use]
    pub fn spawning(&self) -> SpawningConfig {
        SpawningConfig::new(self.spawn_radius, self.seed)
    }

    /// Real-time period between timer firings.
    #[must_use]
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs(u64::from(self.tick_interval_secs))
    }
}

/// Score persistence parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Location of the JSON-lines score file.
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_STORE_PATH),
        }
    }
}

/// Complete plugin configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PluginConfig {
    /// `[game]` section.
    pub game: GameConfig,
    /// `[store]` section.
    pub store: StoreConfig,
}

impl PluginConfig {
    /// Parses and validates configuration from TOML text. Missing fields take their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates the configuration file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Rejects values that would make sessions misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.game.duration_secs == 0 {
            return Err(ConfigError::ZeroDuration);
        }
        if self.game.tick_interval_secs == 0 {
            return Err(ConfigError::ZeroTickInterval);
        }
        if self.game.spawn_radius < 0 {
            return Err(ConfigError::NegativeSpawnRadius(self.game.spawn_radius));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let config = PluginConfig::from_toml_str("").expect("valid config");
        assert_eq!(config, PluginConfig::default());
        assert_eq!(config.game.duration_secs, 20);
        assert_eq!(config.game.tick_interval_secs, 5);
        assert_eq!(config.game.spawn_radius, 10);
        assert_eq!(config.game.seed, None);
        assert_eq!(config.store.path, PathBuf::from(DEFAULT_STORE_PATH));
        assert_eq!(config.game.tick_period(), Duration::from_secs(5));
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = PluginConfig::from_toml_str(
            r#"
            [game]
            seed = 42
            spawn_radius = 3

            [store]
            path = "data/scores.jsonl"
            "#,
        )
        .expect("valid config");

        assert_eq!(config.game.seed, Some(42));
        assert_eq!(config.game.spawn_radius, 3);
        assert_eq!(config.game.duration_secs, 20);
        assert_eq!(config.store.path, PathBuf::from("data/scores.jsonl"));
        assert_eq!(config.game.session(), SessionConfig::new(20, 5));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            PluginConfig::from_toml_str("[game]\nduration_secs = 0"),
            Err(ConfigError::ZeroDuration)
        ));
        assert!(matches!(
            PluginConfig::from_toml_str("[game]\ntick_interval_secs = 0"),
            Err(ConfigError::ZeroTickInterval)
        ));
        assert!(matches!(
            PluginConfig::from_toml_str("[game]\nspawn_radius = -1"),
            Err(ConfigError::NegativeSpawnRadius(-1))
        ));
        assert!(matches!(
            PluginConfig::from_toml_str("[game]\nlives = 3"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_reports_its_path() {
        let error = PluginConfig::load("/nonexistent/enemy-down.toml").expect_err("missing");
        assert!(error.to_string().contains("/nonexistent/enemy-down.toml"));
    }
}
