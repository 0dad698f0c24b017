//! Thread content extraction
//!
//! Turns a fetched thread page into a [`Record`]. Title, post body and
//! timestamp are each located through a selector chain, so pages rendered by
//! different forum software versions are handled by the same extractor.

use crate::config::{FilterConfig, SelectorConfig};
use crate::crawler::selectors::{collapse_whitespace, element_text, SelectorChain};
use crate::models::{RawThread, Record};
use crate::ConfigError;
use scraper::{ElementRef, Html, Node};
use std::fmt;
use std::str::FromStr;

/// Title used when no title selector matches
pub const DEFAULT_TITLE: &str = "No Title";

/// Maximum number of characters of page HTML included in diagnostics
const EXCERPT_CHARS: usize = 500;

/// Writing systems recognized by the content policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Script {
    Latin,
    Cyrillic,
    Greek,
}

impl Script {
    /// Whether `c` is a letter of this script
    pub fn contains(self, c: char) -> bool {
        if !c.is_alphabetic() {
            return false;
        }

        match self {
            Self::Latin => matches!(c,
                'a'..='z' | 'A'..='Z'
                | '\u{00C0}'..='\u{00D6}'
                | '\u{00D8}'..='\u{00F6}'
                | '\u{00F8}'..='\u{024F}'
                | '\u{1E00}'..='\u{1EFF}'),
            Self::Cyrillic => matches!(c,
                '\u{0400}'..='\u{052F}'
                | '\u{1C80}'..='\u{1C8F}'
                | '\u{2DE0}'..='\u{2DFF}'
                | '\u{A640}'..='\u{A69F}'),
            Self::Greek => matches!(c, '\u{0370}'..='\u{03FF}' | '\u{1F00}'..='\u{1FFF}'),
        }
    }
}

impl FromStr for Script {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "latin" => Ok(Self::Latin),
            "cyrillic" => Ok(Self::Cyrillic),
            "greek" => Ok(Self::Greek),
            other => Err(ConfigError::Validation(format!(
                "unknown script '{}', expected latin, cyrillic or greek",
                other
            ))),
        }
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Latin => "latin",
            Self::Cyrillic => "cyrillic",
            Self::Greek => "greek",
        };
        f.write_str(name)
    }
}

/// Rejects post bodies containing letters of disallowed scripts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentPolicy {
    disallowed: Vec<Script>,
}

impl ContentPolicy {
    pub fn new(disallowed: Vec<Script>) -> Self {
        Self { disallowed }
    }

    /// A policy that accepts everything
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Policy for Cyrillic-language forums: any Latin letter rejects a post
    pub fn cyrillic_only() -> Self {
        Self::new(vec![Script::Latin])
    }

    pub fn from_config(config: &FilterConfig) -> Result<Self, ConfigError> {
        let disallowed = config
            .disallowed_scripts
            .iter()
            .map(|name| name.parse())
            .collect::<Result<Vec<Script>, _>>()?;
        Ok(Self::new(disallowed))
    }

    pub fn is_active(&self) -> bool {
        !self.disallowed.is_empty()
    }

    /// Returns the first disallowed script found in `text`, if any
    pub fn violation(&self, text: &str) -> Option<Script> {
        if self.disallowed.is_empty() {
            return None;
        }

        text.chars()
            .find_map(|c| self.disallowed.iter().copied().find(|script| script.contains(c)))
    }
}

/// Outcome of extracting one thread
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction {
    /// A record was produced
    Record(Record),
    /// The content policy discarded the thread; it still counts as processed
    Rejected { id: String, script: Script },
    /// No post body could be located
    NoContent { id: String },
}

/// Extracts records from thread pages
#[derive(Debug, Clone)]
pub struct ContentExtractor {
    title: SelectorChain,
    body: SelectorChain,
    quote: SelectorChain,
    timestamp: SelectorChain,
    policy: ContentPolicy,
    site_url: String,
}

impl ContentExtractor {
    /// Creates an extractor from the configured selector chains
    pub fn new(
        selectors: &SelectorConfig,
        policy: ContentPolicy,
        site_url: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            title: SelectorChain::compile(&selectors.title)?,
            body: SelectorChain::compile(&selectors.body)?,
            quote: SelectorChain::compile(&selectors.quote)?,
            timestamp: SelectorChain::compile(&selectors.timestamp)?,
            policy,
            site_url: site_url.into(),
        })
    }

    /// Extracts the main post of a thread
    pub fn extract(&self, raw: &RawThread) -> Extraction {
        let document = Html::parse_document(&raw.html);

        let Some((body_selector, containers)) = self.body.first_match(&document) else {
            tracing::warn!(
                thread_id = %raw.id,
                url = %raw.url,
                excerpt = %excerpt(&raw.html),
                "Could not find post content"
            );
            return Extraction::NoContent { id: raw.id.clone() };
        };
        tracing::debug!(thread_id = %raw.id, selector = body_selector, "Found post body");

        let container = containers[0];
        let mut content = self.body_text(container);
        if content.is_empty() {
            // The whole post may be a single quote
            content = element_text(&container);
        }

        if let Some(script) = self.policy.violation(&content) {
            tracing::info!(
                thread_id = %raw.id,
                url = %raw.url,
                script = %script,
                "Discarding thread rejected by content policy"
            );
            return Extraction::Rejected {
                id: raw.id.clone(),
                script,
            };
        }

        let title = self
            .title
            .first_text(&document)
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());

        Extraction::Record(Record {
            id: raw.id.clone(),
            title,
            site_url: self.site_url.clone(),
            page_url: raw.url.clone(),
            content: (!content.is_empty()).then_some(content),
            published_at: self.timestamp(&document),
            categories: vec![raw.category.clone()],
        })
    }

    /// Flattens the post body, leaving out quoted sub-content
    fn body_text<'a>(&self, container: ElementRef<'a>) -> String {
        let quotes: Vec<ElementRef<'a>> = self
            .quote
            .selectors()
            .flat_map(|selector| container.select(selector))
            .collect();

        let mut parts = Vec::new();
        push_text(container, &quotes, &mut parts);
        collapse_whitespace(&parts.join(" "))
    }

    /// Reads the publish time from the first timestamp carrier present
    ///
    /// A machine-readable attribute wins over the element's visible text.
    fn timestamp(&self, document: &Html) -> Option<String> {
        self.timestamp
            .first_with(document.root_element(), |matches| {
                matches.iter().find_map(|element| {
                    ["datetime", "data-time", "data-datestring"]
                        .iter()
                        .filter_map(|attr| element.value().attr(attr))
                        .map(str::trim)
                        .find(|value| !value.is_empty())
                        .map(str::to_string)
                        .or_else(|| Some(element_text(element)).filter(|t| !t.is_empty()))
                })
            })
            .map(|(_, value)| value)
    }
}

/// Collects text nodes below `element`, skipping the subtrees in `skip`
fn push_text<'a>(element: ElementRef<'a>, skip: &[ElementRef<'a>], out: &mut Vec<String>) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            if !skip.contains(&child_element) {
                push_text(child_element, skip, out);
            }
        } else if let Node::Text(text) = child.value() {
            let text: &str = text;
            out.push(text.to_string());
        }
    }
}

/// A bounded single-line excerpt of a page for log diagnostics
pub fn excerpt(html: &str) -> String {
    html.chars()
        .take(EXCERPT_CHARS)
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}
