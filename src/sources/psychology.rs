use async_trait::async_trait;
use scraper::{ElementRef, Html};
use url::Url;

use super::html::{
    all_texts, collapse_whitespace, document, first_text, next_sibling_named, profile_links,
    selector, text_of,
};
use super::{DiscoveryError, Source};
use crate::harvest::{PageFetcher, ParseError, PartialRecord};

const BASE_URL: &str = "https://psychology.as.virginia.edu";

/// Department of Psychology directory
pub struct PsychologySource {
    base_url: String,
}

impl PsychologySource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for PsychologySource {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
        }
    }
}

/// Paragraph following the `div.field-body` h3 whose text is exactly `heading`
fn section_paragraph(doc: &Html, heading: &str) -> Result<Option<String>, ParseError> {
    let body_sel = selector("div.field-body")?;
    let h3_sel = selector("h3")?;

    let Some(body) = doc.select(&body_sel).next() else {
        return Ok(None);
    };
    let header: Option<ElementRef<'_>> = body
        .select(&h3_sel)
        .find(|h3| text_of(*h3, "") == heading);

    Ok(header
        .and_then(|h3| next_sibling_named(h3, "p"))
        .map(|p| collapse_whitespace(&text_of(p, " ")))
        .filter(|text| !text.is_empty()))
}

#[async_trait]
impl Source for PsychologySource {
    fn id(&self) -> &str {
        "psychology"
    }

    fn department(&self) -> &str {
        "Psychology"
    }

    fn readiness_selector(&self) -> Option<&str> {
        Some("article.container h1")
    }

    async fn discover(&self, fetcher: &dyn PageFetcher) -> Result<Vec<String>, DiscoveryError> {
        let base = Url::parse(&self.base_url)?;
        let directory = base.join("/faculty")?;
        let page = fetcher.fetch(directory.as_str()).await?;
        Ok(profile_links(&page.html, &base)?.into_iter().collect())
    }

    fn parse_profile(&self, html: &str, url: &str) -> Result<PartialRecord, ParseError> {
        let doc = document(html, url)?;

        let name = first_text(&doc, "article.container h1", " ")?;

        let titles = all_texts(&doc, "div.field-field_title")?;
        let title = (!titles.is_empty()).then(|| titles.join("; "));

        let bio = section_paragraph(&doc, "Biography")?;

        let mut expertise = all_texts(&doc, "a[href^='/taxonomy/term/']")?;
        if let Some(focus) = section_paragraph(&doc, "Research Focus")? {
            expertise.push(focus);
        }

        let email = first_text(&doc, "a[href^='mailto:']", "")?;

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
