//! Parser interface the orchestrator hands fetched pages to

use thiserror::Error;

use crate::harvest::PartialRecord;

/// A page the parser could not make sense of
///
/// Missing fields are not errors; parsers return them as `None`.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    #[error("Unrecognized page layout at {url}: {message}")]
    Layout { url: String, message: String },

    #[error("Invalid selector '{0}'")]
    Selector(String),

    #[error("Parser panicked on {url}: {message}")]
    Panicked { url: String, message: String },
}

/// Turns a profile page into whatever fields it exposes
pub trait ProfileParser: Send + Sync {
    fn parse(&self, html: &str, url: &str) -> Result<PartialRecord, ParseError>;
}

impl<F> ProfileParser for F
where
    F: Fn(&str, &str) -> Result<PartialRecord, ParseError> + Send + Sync,
{
    fn parse(&self, html: &str, url: &str) -> Result<PartialRecord, ParseError> {
        self(html, url)
    }
}
