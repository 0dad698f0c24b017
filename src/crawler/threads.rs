//! Paginated thread crawling
//!
//! Each category is walked page by page. A page's thread links are reduced to
//! the ids that are neither persisted as seen nor already attempted during
//! this run; those threads are fetched with bounded concurrency and handed to
//! a [`ThreadSink`] in batches. The walk of a category stops at the first page
//! without unseen threads, at a page that cannot be fetched, at the configured
//! page limit, or on shutdown.

use crate::config::Config;
use crate::crawler::fetcher::Fetcher;
use crate::crawler::links::{extract_links, path_contains};
use crate::crawler::selectors::SelectorChain;
use crate::crawler::{excerpt, ShutdownSignal};
use crate::models::{Category, RawThread, ThreadRef};
use crate::url::{find_exclusion, listing_page_url, thread_id_from_url};
use crate::{ConfigError, HarvestError};
use futures::stream::{self, StreamExt};
use scraper::Html;
use std::collections::HashSet;
use url::Url;

/// Receiver of fetched threads
///
/// The sink owns the seen-id set: `is_seen` is consulted before every fetch and
/// `accept` is expected to persist the batch before marking its ids seen.
pub trait ThreadSink {
    fn is_seen(&self, id: &str) -> bool;

    /// Takes one batch of freshly fetched threads of `category`
    ///
    /// An error aborts the whole crawl.
    fn accept(&mut self, category: &Category, threads: Vec<RawThread>) -> Result<(), HarvestError>;
}

/// Why the page loop of a category ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopReason {
    /// A page listed threads, but all of them were already seen
    #[default]
    NoNewThreads,
    /// A page had no recognizable thread links at all
    NoThreadLinks,
    /// A page after the first does not exist
    EndOfListing,
    /// A listing page could not be fetched
    PageFetchFailed,
    /// The configured page limit was reached
    PageLimit,
    Shutdown,
}

/// Outcome of crawling one category
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryReport {
    pub category: String,
    /// Listing pages that contributed unseen threads
    pub pages: u32,
    pub threads_fetched: usize,
    pub fetch_failures: usize,
    pub stop: StopReason,
}

/// Walks category listings and fetches unseen threads
#[derive(Clone)]
pub struct ThreadCrawler {
    fetcher: Fetcher,
    chain: SelectorChain,
    thread_path: String,
    page_segment: String,
    max_pages: u32,
    max_concurrent: usize,
    batch_size: usize,
    excluded: Vec<String>,
    shutdown: ShutdownSignal,
}

impl ThreadCrawler {
    pub fn new(config: &Config, fetcher: Fetcher, shutdown: ShutdownSignal) -> Result<Self, ConfigError> {
        Ok(Self {
            fetcher,
            chain: SelectorChain::compile(&config.selectors.thread)?,
            thread_path: config.selectors.thread_path.clone(),
            page_segment: config.crawler.page_segment.clone(),
            max_pages: config.crawler.max_pages,
            max_concurrent: config.crawler.max_concurrent_requests.max(1) as usize,
            batch_size: config.crawler.batch_size,
            excluded: config.crawler.excluded_categories.clone(),
            shutdown,
        })
    }

    /// Crawls every category that is not excluded
    pub async fn crawl<S: ThreadSink>(
        &self,
        categories: &[Category],
        sink: &mut S,
    ) -> Result<Vec<CategoryReport>, HarvestError> {
        let mut reports = Vec::new();
        // Ids handed to the fetcher this run, across all categories
        let mut attempted: HashSet<String> = HashSet::new();

        for category in categories {
            if let Some(pattern) = find_exclusion(&self.excluded, &category.name) {
                tracing::info!(category = %category.name, pattern, "Skipping excluded category");
                continue;
            }

            if self.shutdown.is_triggered() {
                break;
            }

            reports.push(self.crawl_category(category, sink, &mut attempted).await?);
        }

        Ok(reports)
    }

    /// Walks the listing pages of one category
    ///
    /// Ids already in `attempted` are not fetched again, even when their
    /// earlier fetch failed.
    pub async fn crawl_category<S: ThreadSink>(
        &self,
        category: &Category,
        sink: &mut S,
        attempted: &mut HashSet<String>,
    ) -> Result<CategoryReport, HarvestError> {
        tracing::info!(category = %category.name, url = %category.url, "Crawling category");

        let mut report = CategoryReport {
            category: category.name.clone(),
            ..Default::default()
        };
        let mut page: u32 = 1;

        report.stop = loop {
            if self.shutdown.is_triggered() {
                break StopReason::Shutdown;
            }
            if self.max_pages > 0 && page > self.max_pages {
                break StopReason::PageLimit;
            }

            let page_url = listing_page_url(&category.url, page, &self.page_segment)?;
            let html = match self.fetcher.fetch(page_url.as_str()).await {
                Ok(html) => html,
                Err(e) if page > 1 && e.status() == Some(404) => {
                    tracing::info!(category = %category.name, page, "Listing ended");
                    break StopReason::EndOfListing;
                }
                Err(e) => {
                    tracing::error!(
                        category = %category.name,
                        page,
                        url = %page_url,
                        error = %e,
                        "Failed to fetch listing page, abandoning category"
                    );
                    break StopReason::PageFetchFailed;
                }
            };

            let refs = self.thread_refs(&html, &page_url);
            if refs.is_empty() {
                tracing::warn!(
                    category = %category.name,
                    page,
                    excerpt = %excerpt(&html),
                    "No thread links on listing page"
                );
                break StopReason::NoThreadLinks;
            }

            let total = refs.len();
            let unseen: Vec<ThreadRef> = refs
                .into_iter()
                .filter(|r| !sink.is_seen(&r.id) && attempted.insert(r.id.clone()))
                .collect();

            if unseen.is_empty() {
                tracing::info!(category = %category.name, page, total, "No new threads on page");
                break StopReason::NoNewThreads;
            }

            tracing::info!(
                category = %category.name,
                page,
                total,
                new = unseen.len(),
                "Found new threads"
            );
            report.pages += 1;

            let chunk_size = if self.batch_size == 0 { unseen.len() } else { self.batch_size };
            for chunk in unseen.chunks(chunk_size) {
                let (threads, failures) = self.fetch_threads(category, chunk).await;
                report.threads_fetched += threads.len();
                report.fetch_failures += failures;

                if !threads.is_empty() {
                    sink.accept(category, threads)?;
                }
                if self.shutdown.is_triggered() {
                    break;
                }
            }

            page += 1;
        };

        tracing::info!(
            category = %category.name,
            pages = report.pages,
            fetched = report.threads_fetched,
            failures = report.fetch_failures,
            stop = ?report.stop,
            "Finished category"
        );

        Ok(report)
    }

    /// Extracts the thread references of a listing page
    ///
    /// Links whose URL carries no usable id are dropped.
    pub fn thread_refs(&self, html: &str, page_url: &Url) -> Vec<ThreadRef> {
        let document = Html::parse_document(html);
        let set = extract_links(&document, &self.chain, page_url, path_contains(&self.thread_path));

        let mut ids = HashSet::new();
        set.links
            .into_iter()
            .filter_map(|link| match thread_id_from_url(&link.url) {
                Ok(id) => Some(ThreadRef {
                    id,
                    url: link.url.to_string(),
                }),
                Err(e) => {
                    tracing::debug!(url = %link.url, error = %e, "Skipping thread link");
                    None
                }
            })
            .filter(|r| ids.insert(r.id.clone()))
            .collect()
    }

    /// Fetches threads concurrently, preserving their listing order
    ///
    /// Returns the fetched threads and the number of failed fetches. Threads
    /// not yet started when shutdown is triggered are skipped.
    async fn fetch_threads(&self, category: &Category, refs: &[ThreadRef]) -> (Vec<RawThread>, usize) {
        let results: Vec<Option<Result<RawThread, ()>>> = stream::iter(refs)
            .map(|thread| async move {
                if self.shutdown.is_triggered() {
                    return None;
                }

                let outcome = match self.fetcher.fetch(&thread.url).await {
                    Ok(html) => Ok(RawThread {
                        id: thread.id.clone(),
                        url: thread.url.clone(),
                        html,
                        category: category.name.clone(),
                    }),
                    Err(e) => {
                        tracing::warn!(
                            thread_id = %thread.id,
                            url = %thread.url,
                            error = %e,
                            "Skipping thread after failed fetch"
                        );
                        Err(())
                    }
                };
                Some(outcome)
            })
            .buffered(self.max_concurrent)
            .collect()
            .await;

        let mut threads = Vec::new();
        let mut failures = 0;
        for result in results.into_iter().flatten() {
            match result {
                Ok(thread) => threads.push(thread),
                Err(()) => failures += 1,
            }
        }

        (threads, failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::crawler::fetcher::build_http_client;
    use crate::crawler::rate_gate::RateGate;
    use crate::crawler::retry::RetryPolicy;
    use std::sync::Arc;
    use std::time::Duration;

    fn config() -> Config {
        parse_config(
            r#"
            [site]
            url = "https://forum.example.com/"
            name = "example"
            "#,
        )
        .unwrap()
    }

    fn crawler() -> ThreadCrawler {
        let config = config();
        let client = build_http_client(&config.http, Duration::from_secs(5)).unwrap();
        let fetcher = Fetcher::new(client, Arc::new(RateGate::unlimited()), RetryPolicy::no_retry());
        ThreadCrawler::new(&config, fetcher, ShutdownSignal::new()).unwrap()
    }

    #[test]
    fn test_thread_refs_from_xenforo2_listing() {
        let html = r#"
            <div class="structItem-title"><a href="/threads/hello.10/">Hello</a></div>
            <div class="structItem-title"><a href="/threads/hello.10/unread">Hello</a></div>
            <div class="structItem-title"><a href="/threads/world.11/">World</a></div>
            <a href="/members/alice.5/">Alice</a>
        "#;
        let page = Url::parse("https://forum.example.com/forums/general.1/").unwrap();

        let refs = crawler().thread_refs(html, &page);
        let ids: Vec<&str> = refs.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["10", "11"]);
        assert_eq!(refs[0].url, "https://forum.example.com/threads/hello.10/");
    }

    #[test]
    fn test_thread_refs_fallback_scan() {
        let html = r#"<table><tr><td><a href="/threads/legacy.77/">Legacy</a></td></tr></table>"#;
        let page = Url::parse("https://forum.example.com/forums/old.2/page-3").unwrap();

        let refs = crawler().thread_refs(html, &page);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].id, "77");
    }

    #[test]
    fn test_thread_refs_none() {
        let page = Url::parse("https://forum.example.com/forums/general.1/").unwrap();
        assert!(crawler().thread_refs("<p>empty</p>", &page).is_empty());
    }

    #[test]
    fn test_report_default_stop() {
        assert_eq!(CategoryReport::default().stop, StopReason::NoNewThreads);
    }
}
