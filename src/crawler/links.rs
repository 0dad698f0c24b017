//! Link extraction from listing pages
//!
//! Links are looked up through a [`SelectorChain`]; the first selector that
//! yields at least one acceptable link wins. When no selector produces
//! anything, every anchor of the page is scanned and those whose target passes
//! the predicate are kept, so an unknown markup dialect still yields links.

use crate::crawler::selectors::{element_text, SelectorChain};
use crate::url::{name_from_url, normalize_url};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// A link found on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedLink {
    /// Link text, or a name synthesized from the URL when the anchor is empty
    pub text: String,
    /// Absolute, normalized target
    pub url: Url,
}

/// Which strategy produced a link set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkSource {
    /// A selector of the chain, by source text
    Selector(String),
    /// The all-anchors scan
    Fallback,
    /// Nothing matched
    None,
}

/// Result of a link extraction
#[derive(Debug, Clone)]
pub struct LinkSet {
    pub links: Vec<ExtractedLink>,
    pub source: LinkSource,
}

impl LinkSet {
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

/// Extracts links using `chain`, falling back to a scan of all anchors
///
/// `predicate` decides which absolute targets are acceptable (e.g. "path
/// contains `/threads/`"). It is applied to selector matches and to the
/// fallback scan alike. Returned links keep document order and are unique by
/// URL.
pub fn extract_links<P>(document: &Html, chain: &SelectorChain, base_url: &Url, predicate: P) -> LinkSet
where
    P: Fn(&Url) -> bool,
{
    // A selector wins only if a match passes the predicate; navigation-only
    // matches fall through to the next selector
    let from_chain = chain.first_with(document.root_element(), |matches| {
        let links = collect_links(&matches, base_url, &predicate);
        (!links.is_empty()).then_some(links)
    });

    if let Some((source, links)) = from_chain {
        return LinkSet {
            links,
            source: LinkSource::Selector(source.to_string()),
        };
    }

    let mut links = Vec::new();
    if let Ok(anchors) = Selector::parse("a[href]") {
        let elements: Vec<ElementRef<'_>> = document.select(&anchors).collect();
        links = collect_links(&elements, base_url, &predicate);
    }

    let source = if links.is_empty() {
        LinkSource::None
    } else {
        LinkSource::Fallback
    };

    LinkSet { links, source }
}

/// Builds a predicate accepting URLs whose path contains `fragment`
pub fn path_contains(fragment: &str) -> impl Fn(&Url) -> bool + '_ {
    move |url: &Url| url.path().contains(fragment)
}

/// Resolves, filters and de-duplicates the targets of `elements`
fn collect_links<P>(
    elements: &[ElementRef<'_>],
    base_url: &Url,
    predicate: &P,
) -> Vec<ExtractedLink>
where
    P: Fn(&Url) -> bool,
{
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in elements {
        if element.value().attr("download").is_some() {
            continue;
        }

        let Some(url) = element.value().attr("href").and_then(|href| resolve_link(href, base_url)) else {
            continue;
        };

        if !predicate(&url) || !seen.insert(url.as_str().to_string()) {
            continue;
        }

        let text = element_text(element);
        let text = if text.is_empty() { name_from_url(&url) } else { text };

        links.push(ExtractedLink { text, url });
    }

    links
}

/// Resolves a link href to an absolute, normalized URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only links
/// - Invalid or non-HTTP(S) URLs
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    normalize_url(absolute.as_str()).ok()
}
