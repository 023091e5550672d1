//! Small helpers over `scraper` shared by the source parsers

use scraper::{ElementRef, Html, Node, Selector};
use std::collections::BTreeSet;
use url::Url;

use crate::harvest::ParseError;

pub(crate) fn selector(css: &str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|_| ParseError::Selector(css.to_string()))
}

/// Parses `html`, rejecting documents with nothing in them
pub(crate) fn document(html: &str, url: &str) -> Result<Html, ParseError> {
    if html.trim().is_empty() {
        return Err(ParseError::Layout {
            url: url.to_string(),
            message: "empty document".to_string(),
        });
    }
    Ok(Html::parse_document(html))
}

/// Trimmed text fragments of `element` joined by `separator`
pub(crate) fn text_of(element: ElementRef<'_>, separator: &str) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

/// Text of the first match, if it has any
pub(crate) fn first_text(doc: &Html, css: &str, separator: &str) -> Result<Option<String>, ParseError> {
    let sel = selector(css)?;
    Ok(doc
        .select(&sel)
        .next()
        .map(|el| text_of(el, separator))
        .filter(|s| !s.is_empty()))
}

/// Non-empty texts of every match, in document order
pub(crate) fn all_texts(doc: &Html, css: &str) -> Result<Vec<String>, ParseError> {
    let sel = selector(css)?;
    Ok(doc
        .select(&sel)
        .map(|el| text_of(el, " "))
        .filter(|s| !s.is_empty())
        .collect())
}

/// First following sibling element named `tag`
pub(crate) fn next_sibling_named<'a>(element: ElementRef<'a>, tag: &str) -> Option<ElementRef<'a>> {
    element
        .next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == tag)
}

/// Text of the first non-empty sibling after `heading`, stopping at the next heading
pub(crate) fn first_text_after(heading: ElementRef<'_>) -> Option<String> {
    for sibling in heading.next_siblings() {
        match sibling.value() {
            Node::Text(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    return Some(text.to_string());
                }
            }
            Node::Element(el) if el.name() == heading.value().name() => return None,
            Node::Element(_) => {
                if let Some(el) = ElementRef::wrap(sibling) {
                    let text = text_of(el, " ");
                    if !text.is_empty() {
                        return Some(text);
                    }
                }
            }
            _ => {}
        }
    }
    None
}

/// Collapses runs of whitespace into single spaces
pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Absolute profile URLs for every `a[href^='/people/']` on a directory page
pub(crate) fn profile_links(html: &str, base: &Url) -> Result<BTreeSet<String>, super::DiscoveryError> {
    let doc = Html::parse_document(html);
    let sel = selector("a[href^='/people/']")?;
    let mut links = BTreeSet::new();
    for anchor in doc.select(&sel) {
        if let Some(href) = anchor.value().attr("href") {
            links.insert(base.join(href)?.to_string());
        }
    }
    Ok(links)
}
