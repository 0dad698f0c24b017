//! Crawler module for forum harvesting
//!
//! This module contains the core harvesting logic, including:
//! - Request pacing and retry with backoff
//! - Layered-selector link and content extraction
//! - Category discovery and paginated thread crawling
//! - Overall pipeline coordination

mod categories;
mod content;
mod coordinator;
mod fetcher;
mod links;
mod rate_gate;
mod retry;
mod selectors;
mod threads;

pub use categories::CategoryCrawler;
pub use content::{excerpt, ContentExtractor, ContentPolicy, Extraction, Script, DEFAULT_TITLE};
pub use coordinator::{harvest, Coordinator};
pub use fetcher::{build_http_client, FetchError, Fetcher};
pub use links::{extract_links, path_contains, resolve_link, ExtractedLink, LinkSet, LinkSource};
pub use rate_gate::RateGate;
pub use retry::{RetryPolicy, Retryable};
pub use selectors::{collapse_whitespace, element_text, SelectorChain};
pub use threads::{CategoryReport, StopReason, ThreadCrawler, ThreadSink};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative shutdown flag shared between the signal handler and crawlers
///
/// Once triggered, no new page or thread fetches are scheduled; fetches
/// already in flight complete and their batch is persisted.
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal {
    triggered: Arc<AtomicBool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.triggered.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_signal_is_shared() {
        let signal = ShutdownSignal::new();
        let clone = signal.clone();
        assert!(!clone.is_triggered());

        signal.trigger();
        assert!(clone.is_triggered());
    }
}
