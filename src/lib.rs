//! Faculty-Harvest: a concurrent profile-page harvester
//!
//! This crate discovers faculty profile pages on institutional directory sites,
//! fetches them with a two-tier strategy (plain HTTP first, headless browser
//! rendering when the light fetch is blocked or fails), and produces a lossless
//! page archive plus a uniform record set.

pub mod config;
pub mod harvest;
pub mod output;
pub mod sources;
pub mod storage;

use thiserror::Error;

/// Main error type for run-level harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Discovery failed for source '{source_id}': {message}")]
    Discovery { source_id: String, message: String },

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    /// The shared browser could not be started. All light-tier work that was
    /// still possible has completed; its results travel with the error.
    #[error("Renderer unavailable for source '{source_id}': {reason}")]
    RendererUnavailable {
        source_id: String,
        reason: String,
        partial: Box<harvest::HarvestOutput>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use harvest::{
    normalize, FetchMethod, HarvestOrchestrator, HarvestOutput, NormalizedRecord, PartialRecord,
    RawCapture, RunState,
};
pub use sources::{Source, SourceRegistry};
