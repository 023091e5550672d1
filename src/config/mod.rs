//! Configuration module for Faculty-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use faculty_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Heavy tier capacity: {}", config.harvester.heavy_concurrency);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BlockDetectionConfig, BrowserConfig, Config, HarvesterConfig, OutputConfig, SourceEntry,
    UserAgentConfig, DEFAULT_BLOCK_MARKERS,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
