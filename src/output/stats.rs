//! Statistics of harvest runs and record stores
//!
//! `HarvestStats` is accumulated while a run progresses. `StoreStatistics`
//! is read back from a record store for the `--stats` mode.

use crate::crawler::{CategoryReport, StopReason};
use crate::storage::{RecordStore, StorageError};
use std::collections::BTreeMap;
use std::time::Duration;

/// Counters for one harvest run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestStats {
    /// Categories discovered on the site root
    pub categories_found: usize,

    /// Categories skipped by an exclusion pattern
    pub categories_excluded: usize,

    /// Categories whose listing was walked
    pub categories_crawled: usize,

    /// Listing pages that contributed unseen threads
    pub listing_pages: u32,

    pub threads_fetched: usize,

    /// Thread and listing fetches that failed after retries
    pub fetch_failures: usize,

    pub records_saved: usize,

    /// Threads discarded by the content policy
    pub discarded: usize,

    /// Threads without a recognizable post body
    pub no_content: usize,

    pub batches: usize,

    pub interrupted: bool,

    pub elapsed: Duration,
}

impl HarvestStats {
    /// Folds the outcome of one category into the run totals
    pub fn add_category(&mut self, report: &CategoryReport) {
        self.categories_crawled += 1;
        self.listing_pages += report.pages;
        self.threads_fetched += report.threads_fetched;
        self.fetch_failures += report.fetch_failures;
        if report.stop == StopReason::PageFetchFailed {
            self.fetch_failures += 1;
        }
        if report.stop == StopReason::Shutdown {
            self.interrupted = true;
        }
    }

    /// Logs the run totals
    pub fn log_summary(&self) {
        tracing::info!(
            categories = self.categories_found,
            excluded = self.categories_excluded,
            crawled = self.categories_crawled,
            pages = self.listing_pages,
            fetched = self.threads_fetched,
            failures = self.fetch_failures,
            saved = self.records_saved,
            discarded = self.discarded,
            no_content = self.no_content,
            batches = self.batches,
            elapsed_secs = self.elapsed.as_secs_f64(),
            "Harvest summary"
        );
    }
}

/// Contents of a record store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStatistics {
    /// Where the store keeps its data
    pub location: String,

    pub total_records: usize,

    /// Processed ids, including threads that produced no record
    pub seen_ids: usize,

    pub records_by_category: BTreeMap<String, usize>,
}

/// Loads statistics from a record store
///
/// # Arguments
///
/// * `store` - The store to query
///
/// # Returns
///
/// * `Ok(StoreStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query the store
pub fn load_statistics(store: &dyn RecordStore) -> Result<StoreStatistics, StorageError> {
    Ok(StoreStatistics {
        location: store.location(),
        total_records: store.count_records()?,
        seen_ids: store.count_seen_ids()?,
        records_by_category: store.category_counts()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &StoreStatistics) {
    println!("=== Store Statistics ===\n");

    println!("Store: {}", stats.location);
    println!("  Records: {}", stats.total_records);
    println!("  Seen ids: {}", stats.seen_ids);
    println!(
        "  Processed without record: {}",
        stats.seen_ids.saturating_sub(stats.total_records)
    );
    println!();

    if stats.records_by_category.is_empty() {
        return;
    }

    println!("Records by Category:");
    // Largest first
    let mut counts: Vec<_> = stats.records_by_category.iter().collect();
    counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

    for (category, count) in counts {
        let percentage = if stats.total_records > 0 {
            (*count as f64 / stats.total_records as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", category, count, percentage);
    }
}
