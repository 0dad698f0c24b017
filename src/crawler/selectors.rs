//! Layered CSS selector chains
//!
//! Forum software changes its markup between major versions, so every lookup
//! is expressed as an ordered chain of alternative selectors. The chain is
//! evaluated lazily: the first selector that produces a usable result wins and
//! later selectors are never consulted. Results are never merged across
//! selectors, since each one models a separate markup dialect.

use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};

/// An ordered list of compiled selectors
#[derive(Debug, Clone)]
pub struct SelectorChain {
    entries: Vec<(String, Selector)>,
}

impl SelectorChain {
    /// Compiles every selector of the chain, failing on the first invalid one
    pub fn compile<S: AsRef<str>>(sources: &[S]) -> Result<Self, ConfigError> {
        let entries = sources
            .iter()
            .map(|source| {
                let source = source.as_ref();
                Selector::parse(source)
                    .map(|selector| (source.to_string(), selector))
                    .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", source, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Selector sources in evaluation order
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(source, _)| source.as_str())
    }

    /// Compiled selectors in evaluation order
    pub fn selectors(&self) -> impl Iterator<Item = &Selector> {
        self.entries.iter().map(|(_, selector)| selector)
    }

    /// Evaluates `probe` against each selector's matches in order and returns
    /// the first `Some`, together with the winning selector source
    pub fn first_with<'a, T, F>(&'a self, root: ElementRef<'_>, mut probe: F) -> Option<(&'a str, T)>
    where
        F: FnMut(Vec<ElementRef<'_>>) -> Option<T>,
    {
        self.entries.iter().find_map(|(source, selector)| {
            let matches: Vec<ElementRef<'_>> = root.select(selector).collect();
            probe(matches).map(|value| (source.as_str(), value))
        })
    }

    /// Returns the matches of the first selector that matches anything
    pub fn first_match<'d>(&self, document: &'d Html) -> Option<(&str, Vec<ElementRef<'d>>)> {
        self.entries.iter().find_map(|(source, selector)| {
            let matches: Vec<ElementRef<'d>> = document.select(selector).collect();
            (!matches.is_empty()).then(|| (source.as_str(), matches))
        })
    }

    /// Returns the first non-empty element text found along the chain
    pub fn first_text(&self, document: &Html) -> Option<String> {
        self.selectors().find_map(|selector| {
            document
                .select(selector)
                .map(|element| element_text(&element))
                .find(|text| !text.is_empty())
        })
    }
}

/// Flattens an element to text with whitespace runs collapsed
pub fn element_text(element: &ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

/// Collapses every run of whitespace into a single space and trims the ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
