//! Directory-site sources
//!
//! Each source knows how to find the profile URLs on one department's
//! directory and how to pull fields out of a profile page. The harvester
//! itself never looks inside the HTML.

mod data_science;
mod economics;
mod html;
mod psychology;

pub use data_science::DataScienceSource;
pub use economics::EconomicsSource;
pub use psychology::PsychologySource;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use url::Url;

use crate::config::SourceEntry;
use crate::harvest::{FetchError, PageFetcher, ParseError, PartialRecord, ProfileParser};
use crate::HarvestError;

/// Identifiers of the built-in sources
pub const KNOWN_SOURCE_IDS: &[&str] = &["psychology", "economics", "data-science"];

/// Errors raised while enumerating a directory
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Failed to fetch directory page: {0}")]
    Fetch(#[from] FetchError),

    #[error("Directory page could not be parsed: {0}")]
    Parse(#[from] ParseError),

    #[error("Invalid profile URL: {0}")]
    Url(#[from] url::ParseError),
}

/// One department directory site
#[async_trait]
pub trait Source: Send + Sync {
    /// Registry identifier, stored as `source_id` on every record
    fn id(&self) -> &str;

    /// Human-readable department name
    fn department(&self) -> &str;

    /// Selector a rendered profile page must contain before it is extracted
    fn readiness_selector(&self) -> Option<&str> {
        None
    }

    /// Returns the sorted, de-duplicated profile URLs of the directory
    async fn discover(&self, fetcher: &dyn PageFetcher) -> Result<Vec<String>, DiscoveryError>;

    /// Extracts the fields a profile page exposes
    fn parse_profile(&self, html: &str, url: &str) -> Result<PartialRecord, ParseError>;
}

/// Adapts a [`Source`] to the orchestrator's parser interface
pub struct SourceParser {
    source: Arc<dyn Source>,
}

impl SourceParser {
    pub fn new(source: Arc<dyn Source>) -> Self {
        Self { source }
    }
}

impl ProfileParser for SourceParser {
    fn parse(&self, html: &str, url: &str) -> Result<PartialRecord, ParseError> {
        self.source.parse_profile(html, url)
    }
}

/// Sources by identifier
#[derive(Default)]
pub struct SourceRegistry {
    sources: BTreeMap<String, Arc<dyn Source>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in source at its public address
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PsychologySource::default()));
        registry.register(Arc::new(EconomicsSource::default()));
        registry.register(Arc::new(DataScienceSource::default()));
        registry
    }

    /// Registry holding the sources listed in the configuration
    ///
    /// An empty list means "all built-in sources".
    pub fn from_config(entries: &[SourceEntry]) -> Result<Self, HarvestError> {
        if entries.is_empty() {
            return Ok(Self::with_defaults());
        }

        let mut registry = Self::new();
        for entry in entries {
            registry.register(build_source(&entry.id, entry.base_url.as_deref())?);
        }
        Ok(registry)
    }

    /// Adds `source`, replacing any source with the same id
    pub fn register(&mut self, source: Arc<dyn Source>) {
        self.sources.insert(source.id().to_string(), source);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Source>> {
        self.sources.get(id).cloned()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.sources.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

/// Builds a built-in source, optionally pointed at another base URL
pub fn build_source(id: &str, base_url: Option<&str>) -> Result<Arc<dyn Source>, HarvestError> {
    let base = base_url
        .map(|raw| {
            Url::parse(raw)
                .map(|_| raw.to_string())
                .map_err(|e| crate::ConfigError::InvalidUrl(format!("{}: {}", raw, e)))
        })
        .transpose()?;

    let source: Arc<dyn Source> = match (id, base) {
        ("psychology", Some(base)) => Arc::new(PsychologySource::new(base)),
        ("psychology", None) => Arc::new(PsychologySource::default()),
        ("economics", Some(base)) => Arc::new(EconomicsSource::new(base)),
        ("economics", None) => Arc::new(EconomicsSource::default()),
        ("data-science", Some(base)) => Arc::new(DataScienceSource::new(base)),
        ("data-science", None) => Arc::new(DataScienceSource::default()),
        (other, _) => return Err(HarvestError::UnknownSource(other.to_string())),
    };
    Ok(source)
}
