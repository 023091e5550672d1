//! Fixed-schema normalization of parser output
//!
//! Source parsers extract whatever subset of fields their pages expose. Every
//! record leaving the harvester has the same key set, with absent fields
//! explicitly empty, so storage can rely on one schema.

use serde::{Deserialize, Serialize};

/// Field names of the canonical record, in storage column order
pub const CANONICAL_FIELDS: [&str; 7] = [
    "name",
    "source_id",
    "url",
    "title",
    "bio",
    "expertise",
    "email",
];

/// Fields a source parser managed to extract
///
/// Deserializing from loosely-shaped JSON drops unknown keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PartialRecord {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub source_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub expertise: Option<Vec<String>>,
    #[serde(default)]
    pub email: Option<String>,
}

impl PartialRecord {
    pub fn with_source(mut self, source_id: &str) -> Self {
        self.source_id = Some(source_id.to_string());
        self
    }
}

/// A profile record with the complete canonical key set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub name: Option<String>,
    pub source_id: Option<String>,
    pub url: String,
    pub title: Option<String>,
    pub bio: Option<String>,
    pub expertise: Option<Vec<String>>,
    pub email: Option<String>,
}

impl NormalizedRecord {
    /// The canonical record for `url` with every other field absent
    pub fn empty(url: &str) -> Self {
        Self {
            name: None,
            source_id: None,
            url: url.to_string(),
            title: None,
            bio: None,
            expertise: None,
            email: None,
        }
    }

    pub fn has_email(&self) -> bool {
        self.email.as_deref().is_some_and(|e| !e.trim().is_empty())
    }
}

/// Overlays the present fields of `partial` on the empty record for `url`
pub fn normalize(url: &str, partial: &PartialRecord) -> NormalizedRecord {
    let mut record = NormalizedRecord::empty(url);

    if let Some(name) = &partial.name {
        record.name = Some(name.clone());
    }
    if let Some(source_id) = &partial.source_id {
        record.source_id = Some(source_id.clone());
    }
    if let Some(title) = &partial.title {
        record.title = Some(title.clone());
    }
    if let Some(bio) = &partial.bio {
        record.bio = Some(bio.clone());
    }
    if let Some(expertise) = &partial.expertise {
        record.expertise = Some(expertise.clone());
    }
    if let Some(email) = &partial.email {
        record.email = Some(email.clone());
    }

    record
}
