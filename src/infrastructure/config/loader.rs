//! Layered configuration loading and validation.

use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use thiserror::Error;

use crate::domain::models::config::Config;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid max_concurrent_workers: {0}. Must be at least 1")]
    InvalidMaxConcurrentWorkers(usize),

    #[error("Invalid worker_timeout_secs: {0}. Must be at least 1")]
    InvalidWorkerTimeout(u64),

    #[error("Invalid worker count: worker_count {0} and max_workers {1} must both be at least 1")]
    InvalidWorkerCount(u32, u32),

    #[error("Invalid max_attempts: {0}. Must be at least 1")]
    InvalidMaxAttempts(u32),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must not exceed max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Invalid judge weights: sum is {0}, must be 1.0")]
    InvalidJudgeWeights(f64),

    #[error("Invalid confidence_floor: {0}. Must be between 0 and 1")]
    InvalidConfidenceFloor(f64),

    #[error("Invalid approval expiry_secs: {0}. Must be at least 1")]
    InvalidApprovalExpiry(u64),

    #[error("Invalid complexity band_width: {0}. Must be at least 1")]
    InvalidBandWidth(f64),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .brain/config.yaml (project config)
    /// 3. .brain/local.yaml (project local overrides, optional)
    /// 4. Environment variables (BRAIN_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".brain/config.yaml"))
            .merge(Yaml::file(".brain/local.yaml"))
            .merge(Env::prefixed("BRAIN_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
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
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        if config.executor.max_concurrent_workers == 0 {
            return Err(ConfigError::InvalidMaxConcurrentWorkers(
                config.executor.max_concurrent_workers,
            ));
        }

        if config.executor.worker_timeout_secs == 0 {
            return Err(ConfigError::InvalidWorkerTimeout(0));
        }

        if config.routing.worker_count == 0 || config.routing.max_workers == 0 {
            return Err(ConfigError::InvalidWorkerCount(
                config.routing.worker_count,
                config.routing.max_workers,
            ));
        }

        if config.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts(config.retry.max_attempts));
        }

        if config.retry.initial_backoff_ms > config.retry.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.retry.initial_backoff_ms,
                config.retry.max_backoff_ms,
            ));
        }

        let weight_sum: f64 = config.judge.weights.values().sum();
        if (weight_sum - 1.0).abs() > 1e-6 {
            return Err(ConfigError::InvalidJudgeWeights(weight_sum));
        }

        if !(0.0..=1.0).contains(&config.learner.confidence_floor) {
            return Err(ConfigError::InvalidConfidenceFloor(
                config.learner.confidence_floor,
            ));
        }

        if config.approval.expiry_secs == 0 {
            return Err(ConfigError::InvalidApprovalExpiry(0));
        }

        let band_width = config.routing.complexity.band_width;
        if band_width.is_nan() || band_width < 1.0 {
            return Err(ConfigError::InvalidBandWidth(band_width));
        }

        // Remaining routing and rubric rules live with the runtime types.
        config
            .routing_config()
            .validate()
            .map_err(|e| ConfigError::ValidationFailed(e.to_string()))?;

        Ok(())
    }
}
