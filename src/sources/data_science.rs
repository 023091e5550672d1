use async_trait::async_trait;
use std::collections::BTreeSet;
use url::Url;

use super::html::{all_texts, document, first_text, profile_links, selector};
use super::{DiscoveryError, Source};
use crate::harvest::{PageFetcher, ParseError, PartialRecord};

const BASE_URL: &str = "https://datascience.virginia.edu";

/// School of Data Science directory, paged by surname initial
pub struct DataScienceSource {
    base_url: String,
}

impl DataScienceSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    fn directory_url(base: &Url, letter: char) -> Result<Url, url::ParseError> {
        let mut url = base.join("/faculty-research")?;
        url.query_pairs_mut().append_pair("letter", &letter.to_string());
        Ok(url)
    }
}

impl Default for DataScienceSource {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
        }
    }
}

#[async_trait]
impl Source for DataScienceSource {
    fn id(&self) -> &str {
        "data-science"
    }

    fn department(&self) -> &str {
        "Data Science"
    }

    fn readiness_selector(&self) -> Option<&str> {
        Some("h1")
    }

    async fn discover(&self, fetcher: &dyn PageFetcher) -> Result<Vec<String>, DiscoveryError> {
        let base = Url::parse(&self.base_url)?;
        let mut links = BTreeSet::new();
        for letter in 'A'..='Z' {
            let directory = Self::directory_url(&base, letter)?;
            let page = fetcher.fetch(directory.as_str()).await?;
            links.extend(profile_links(&page.html, &base)?);
        }
        Ok(links.into_iter().collect())
    }

    fn parse_profile(&self, html: &str, url: &str) -> Result<PartialRecord, ParseError> {
        let doc = document(html, url)?;

        let name = first_text(&doc, "h1", " ")?;
        let title = first_text(&doc, "div.field--title", "")?;
        let bio = first_text(&doc, "div.field--bio.field--body", " ")?;

        let expertise = all_texts(&doc, "div.list-text")?;

        let mail_sel = selector("section.person a[href^='mailto:']")?;
        let email = doc
            .select(&mail_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .map(|href| href.trim_start_matches("mailto:").to_string())
            .filter(|e| !e.is_empty());

        Ok(PartialRecord {
            name,
            title,
            bio,
            expertise: (!expertise.is_empty()).then_some(expertise),
            email,
            ..Default::default()
        })
    }
}
