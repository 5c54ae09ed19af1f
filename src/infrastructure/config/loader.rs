use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::{Config, EngineConfig};

/// Configuration error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid window_length: {0}. Must be at least 2")]
    InvalidWindowLength(usize),

    #[error("Invalid min_history_for_test: {0}. Must be at least 1")]
    InvalidMinHistory(usize),

    #[error("min_history_for_test ({min}) cannot exceed window_length ({window})")]
    MinHistoryExceedsWindow { min: usize, window: usize },

    #[error("Invalid narrowing_significance: {0}. Must be finite and in [0, 1]")]
    InvalidSignificance(f64),

    #[error("Invalid orientation_threshold: {0}. Must be in [0, 1]")]
    InvalidOrientationThreshold(f64),

    #[error("Invalid attribution_threshold: {0}. Must be in [0, 1]")]
    InvalidAttributionThreshold(f64),

    #[error("Invalid confirmation_periods: {0}. Must be at least 1")]
    InvalidConfirmationPeriods(u32),

    #[error("Invalid demotion_periods: {0}. Must be at least 1")]
    InvalidDemotionPeriods(u32),

    #[error("Invalid floor_weight: {0}. Must be finite and non-negative")]
    InvalidFloorWeight(f64),

    #[error("Invalid weight_cap: {0}. Must be in (0, 1]")]
    InvalidWeightCap(f64),

    #[error("Invalid {name}: {value}. Must be finite and non-negative")]
    InvalidTierWeight { name: &'static str, value: f64 },

    #[error("Invalid orientation_noise_floor: {0}. Must be finite and non-negative")]
    InvalidNoiseFloor(f64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),
}

fn is_unit(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

fn is_non_negative(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .pioneer/config.yaml (project config)
    /// 3. .pioneer/local.yaml (project local overrides, optional)
    /// 4. Environment variables (PIONEER_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".pioneer/config.yaml"))
            .merge(Yaml::file(".pioneer/local.yaml"))
            .merge(Env::prefixed("PIONEER_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honouring `PIONEER_*` overrides
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("PIONEER_").split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        Self::validate_engine(&config.engine)?;

        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(config.logging.rotation.clone()));
        }

        Ok(())
    }

    /// Validate the detection parameters. The engine refuses to start otherwise.
    pub fn validate_engine(engine: &EngineConfig) -> Result<(), ConfigError> {
        if engine.window_length < 2 {
            return Err(ConfigError::InvalidWindowLength(engine.window_length));
        }
        if engine.min_history_for_test < 1 {
            return Err(ConfigError::InvalidMinHistory(engine.min_history_for_test));
        }
        if engine.min_history_for_test > engine.window_length {
            return Err(ConfigError::MinHistoryExceedsWindow {
                min: engine.min_history_for_test,
                window: engine.window_length,
            });
        }
        if !is_unit(engine.narrowing_significance) {
            return Err(ConfigError::InvalidSignificance(
                engine.narrowing_significance,
            ));
        }
        if !is_unit(engine.orientation_threshold) {
            return Err(ConfigError::InvalidOrientationThreshold(
                engine.orientation_threshold,
            ));
        }
        if !is_unit(engine.attribution_threshold) {
            return Err(ConfigError::InvalidAttributionThreshold(
                engine.attribution_threshold,
            ));
        }
        if engine.confirmation_periods == 0 {
            return Err(ConfigError::InvalidConfirmationPeriods(
                engine.confirmation_periods,
            ));
        }
        if engine.demotion_periods == 0 {
            return Err(ConfigError::InvalidDemotionPeriods(engine.demotion_periods));
        }
        if !is_non_negative(engine.floor_weight) {
            return Err(ConfigError::InvalidFloorWeight(engine.floor_weight));
        }
        if !(engine.weight_cap.is_finite() && engine.weight_cap > 0.0 && engine.weight_cap <= 1.0)
        {
            return Err(ConfigError::InvalidWeightCap(engine.weight_cap));
        }
        for (name, value) in [
            ("candidate_weight", engine.candidate_weight),
            ("pioneer_weight", engine.pioneer_weight),
        ] {
            if !is_non_negative(value) {
                return Err(ConfigError::InvalidTierWeight { name, value });
            }
        }
        if !is_non_negative(engine.orientation_noise_floor) {
            return Err(ConfigError::InvalidNoiseFloor(
                engine.orientation_noise_floor,
            ));
        }
        Ok(())
    }
}
