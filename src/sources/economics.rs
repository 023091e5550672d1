use async_trait::async_trait;
use scraper::{ElementRef, Html, Node};
use url::Url;

use super::html::{
    all_texts, collapse_whitespace, document, first_text, first_text_after, next_sibling_named,
    profile_links, selector, text_of,
};
use super::{DiscoveryError, Source};
use crate::harvest::{PageFetcher, ParseError, PartialRecord};

const BASE_URL: &str = "https://economics.virginia.edu";

const EXPERTISE_HEADINGS: &[&str] = &["Fields of Interest", "Research Interests"];

/// Department of Economics directory
pub struct EconomicsSource {
    base_url: String,
}

impl EconomicsSource {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl Default for EconomicsSource {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
        }
    }
}

/// Biography section, or the body text before the first h3 when there is none
fn biography(doc: &Html) -> Result<Option<String>, ParseError> {
    let body_sel = selector("div.field-body")?;
    let h3_sel = selector("h3")?;

    let Some(body) = doc.select(&body_sel).next() else {
        return Ok(None);
    };

    let header: Option<ElementRef<'_>> = body
        .select(&h3_sel)
        .find(|h3| text_of(*h3, "").contains("Biography"));

    let bio = match header {
        Some(h3) => next_sibling_named(h3, "p").map(|p| text_of(p, " ")),
        None => {
            let mut parts = Vec::new();
            for child in body.children() {
                match child.value() {
                    Node::Element(el) if el.name() == "h3" => break,
                    Node::Element(_) => {
                        if let Some(el) = ElementRef::wrap(child) {
                            let text = text_of(el, " ");
                            if !text.is_empty() {
                                parts.push(text);
                            }
                        }
                    }
                    Node::Text(text) => {
                        let text = text.trim();
                        if !text.is_empty() {
                            parts.push(text.to_string());
                        }
                    }
                    _ => {}
                }
            }
            (!parts.is_empty()).then(|| parts.join(" "))
        }
    };

    Ok(bio.map(|b| collapse_whitespace(&b)).filter(|b| !b.is_empty()))
}

#[async_trait]
impl Source for EconomicsSource {
    fn id(&self) -> &str {
        "economics"
    }

    fn department(&self) -> &str {
        "Economics"
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

        let name = first_text(&doc, "article.container h1 span", " ")?;

        let titles = all_texts(&doc, "div.field-field_title")?;
        let title = (!titles.is_empty()).then(|| titles.join("; "));

        let bio = biography(&doc)?;

        let h3_sel = selector("h3")?;
        let expertise: Vec<String> = doc
            .select(&h3_sel)
            .filter(|h3| EXPERTISE_HEADINGS.contains(&text_of(*h3, "").as_str()))
            .filter_map(first_text_after)
            .collect();

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
