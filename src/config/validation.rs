use crate::config::types::{
    BlockDetectionConfig, Config, HarvesterConfig, OutputConfig, SourceEntry, UserAgentConfig,
};
use crate::sources::KNOWN_SOURCE_IDS;
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_harvester_config(&config.harvester)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_block_detection(&config.block_detection)?;
    validate_output_config(&config.output)?;
    validate_sources(&config.sources)?;
    Ok(())
}

/// Validates tier capacities and timeouts
fn validate_harvester_config(config: &HarvesterConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("light_concurrency", config.light_concurrency),
        ("heavy_concurrency", config.heavy_concurrency),
    ] {
        if !(1..=100).contains(&value) {
            return Err(ConfigError::Validation(format!(
                "{} must be between 1 and 100, got {}",
                name, value
            )));
        }
    }

    for (name, value) in [
        ("light_timeout_secs", config.light_timeout_secs),
        ("heavy_timeout_secs", config.heavy_timeout_secs),
        ("readiness_timeout_secs", config.readiness_timeout_secs),
    ] {
        if value < 1 {
            return Err(ConfigError::Validation(format!(
                "{} must be >= 1s, got {}s",
                name, value
            )));
        }
    }

    if config.heavy_timeout_secs < config.light_timeout_secs {
        return Err(ConfigError::Validation(format!(
            "heavy_timeout_secs ({}) must not be shorter than light_timeout_secs ({})",
            config.heavy_timeout_secs, config.light_timeout_secs
        )));
    }

    Ok(())
}

fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    if config.value.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent value cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_block_detection(config: &BlockDetectionConfig) -> Result<(), ConfigError> {
    if config.markers.is_empty() {
        return Err(ConfigError::Validation(
            "block-detection markers cannot be empty".to_string(),
        ));
    }
    if config.markers.iter().any(|m| m.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "block-detection markers cannot contain blank entries".to_string(),
        ));
    }
    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates source entries: known ids, no duplicates, parseable base URLs
fn validate_sources(sources: &[SourceEntry]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for entry in sources {
        if !KNOWN_SOURCE_IDS.contains(&entry.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "unknown source id '{}', expected one of: {}",
                entry.id,
                KNOWN_SOURCE_IDS.join(", ")
            )));
        }

        if !seen.insert(entry.id.as_str()) {
            return Err(ConfigError::Validation(format!(
                "source '{}' is listed more than once",
                entry.id
            )));
        }

        if let Some(base_url) = &entry.base_url {
            let parsed = Url::parse(base_url).map_err(|e| {
                ConfigError::InvalidUrl(format!("Invalid base-url for '{}': {}", entry.id, e))
            })?;
            if parsed.scheme() != "http" && parsed.scheme() != "https" {
                return Err(ConfigError::InvalidUrl(format!(
                    "base-url for '{}' must be http or https, got '{}'",
                    entry.id,
                    parsed.scheme()
                )));
            }
        }

        if let Some(selector) = &entry.readiness_selector {
            if selector.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "readiness-selector for '{}' cannot be blank",
                    entry.id
                )));
            }
        }
    }

    Ok(())
}
