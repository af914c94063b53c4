//! Configuration management for the traffic guard.
//!
//! This module handles loading and managing application configuration
//! from an optional TOML file and environment variables.

use std::env;
use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use crate::models::Config;

/// Load configuration from the config file and environment variables
pub fn load_config() -> Result<Config, ConfigError> {
    let config_file = env::var("CONFIG_FILE").unwrap_or_else(|_| "config/default.toml".to_string());

    let config: Config = ConfigBuilder::builder()
        .add_source(File::with_name(&config_file).required(false))
        .add_source(
            Environment::with_prefix("TRAFFIC_GUARD")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("guard.whitelisted_ips")
                .with_list_parse_key("guard.whitelisted_path_prefixes")
                .with_list_parse_key("detection.bot_user_agents"),
        )
        .build()?
        .try_deserialize()?;

    validate(&config)?;
    Ok(config)
}

/// Semantic checks that serde cannot express
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    let sample_rate = config.sweeper.sample_rate;
    if !(0.0..=1.0).contains(&sample_rate) {
        return Err(ConfigError::Message(format!(
            "sweeper.sample_rate must be within [0, 1], got {}",
            sample_rate
        )));
    }
    if config.detection.burst_window_secs == 0 {
        return Err(ConfigError::Message("detection.burst_window_secs must be positive".into()));
    }
    if config.detection.max_user_agents == 0 {
        return Err(ConfigError::Message("detection.max_user_agents must be positive".into()));
    }
    if config.guard.retry_after_secs == 0 {
        return Err(ConfigError::Message("guard.retry_after_secs must be positive".into()));
    }
    if let Some(prefix) = config
        .guard
        .whitelisted_path_prefixes
        .iter()
        .find(|p| !p.starts_with('/'))
    {
        return Err(ConfigError::Message(format!(
            "guard.whitelisted_path_prefixes entry {:?} must start with '/'",
            prefix
        )));
    }
    Ok(())
}
