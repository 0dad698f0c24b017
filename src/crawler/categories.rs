//! Category discovery
//!
//! The site root is fetched exactly once. Category links are located through
//! the category selector chain; forums whose markup matches none of the
//! selectors still yield categories through the anchor scan restricted to
//! category-looking paths.

use crate::config::SelectorConfig;
use crate::crawler::fetcher::Fetcher;
use crate::crawler::links::{extract_links, path_contains, LinkSource};
use crate::crawler::selectors::SelectorChain;
use crate::models::Category;
use crate::url::normalize_url;
use crate::{ConfigError, HarvestError};
use scraper::Html;
use url::Url;

/// Discovers the top-level sections of a forum
#[derive(Clone)]
pub struct CategoryCrawler {
    fetcher: Fetcher,
    chain: SelectorChain,
    category_path: String,
}

impl CategoryCrawler {
    pub fn new(fetcher: Fetcher, selectors: &SelectorConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            fetcher,
            chain: SelectorChain::compile(&selectors.category)?,
            category_path: selectors.category_path.clone(),
        })
    }

    /// Fetches `base_url` and returns its categories in document order
    ///
    /// A failed root fetch is logged and yields no categories; it is not
    /// retried. Only an unusable `base_url` is an error.
    pub async fn discover(&self, base_url: &str) -> Result<Vec<Category>, HarvestError> {
        let base = normalize_url(base_url)?;
        tracing::info!(url = %base, "Discovering categories");

        let html = match self.fetcher.fetch_once(base.as_str()).await {
            Ok(html) => html,
            Err(e) => {
                tracing::error!(url = %base, status = ?e.status(), error = %e, "Failed to fetch site root");
                return Ok(Vec::new());
            }
        };

        let categories = self.parse(&html, &base);
        if categories.is_empty() {
            tracing::warn!(url = %base, "No categories found on site root");
        } else {
            tracing::info!(count = categories.len(), "Discovered categories");
        }

        Ok(categories)
    }

    /// Extracts categories from an already fetched root page
    pub fn parse(&self, html: &str, base: &Url) -> Vec<Category> {
        let document = Html::parse_document(html);
        let set = extract_links(&document, &self.chain, base, path_contains(&self.category_path));

        if set.source == LinkSource::Fallback {
            tracing::debug!("Category selectors matched nothing, used anchor scan");
        }

        set.links
            .into_iter()
            .map(|link| Category {
                name: link.text,
                url: link.url.to_string(),
            })
            .collect()
    }
}
