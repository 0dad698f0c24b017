//! Harvest coordinator - main pipeline orchestration
//!
//! This module wires the pipeline together:
//! - Opening the record store and loading the seen-id set
//! - Discovering categories and walking their listings
//! - Extracting records from fetched threads
//! - Persisting every batch before its ids count as seen

use crate::config::Config;
use crate::crawler::categories::CategoryCrawler;
use crate::crawler::content::{ContentExtractor, ContentPolicy, Extraction};
use crate::crawler::fetcher::{build_http_client, Fetcher};
use crate::crawler::rate_gate::RateGate;
use crate::crawler::retry::RetryPolicy;
use crate::crawler::threads::{ThreadCrawler, ThreadSink};
use crate::crawler::ShutdownSignal;
use crate::models::{Category, RawThread};
use crate::output::HarvestStats;
use crate::storage::{open_store, Batch, RecordStore};
use crate::url::find_exclusion;
use crate::HarvestError;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main harvest coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    store: Box<dyn RecordStore>,
    categories: CategoryCrawler,
    threads: ThreadCrawler,
    extractor: ContentExtractor,
    write_retry: RetryPolicy,
    shutdown: ShutdownSignal,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The harvester configuration
    /// * `shutdown` - Signal that stops scheduling new fetches
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(HarvestError)` - Failed to open the store or build the pipeline
    pub fn new(config: Config, shutdown: ShutdownSignal) -> Result<Self, HarvestError> {
        let store = open_store(&config)?;
        Self::with_store(config, store, shutdown)
    }

    /// Creates a coordinator that persists into `store`
    pub fn with_store(
        config: Config,
        store: Box<dyn RecordStore>,
        shutdown: ShutdownSignal,
    ) -> Result<Self, HarvestError> {
        let client = build_http_client(
            &config.http,
            Duration::from_secs(config.crawler.request_timeout),
        )?;
        let gate = Arc::new(RateGate::new(config.crawler.requests_per_second));
        let fetcher = Fetcher::new(client, gate, RetryPolicy::from_config(&config.retry));

        let policy = ContentPolicy::from_config(&config.filter)?;
        if policy.is_active() {
            tracing::info!(disallowed = ?config.filter.disallowed_scripts, "Content policy active");
        }

        let extractor = ContentExtractor::new(&config.selectors, policy, config.site.url.clone())?;
        let categories = CategoryCrawler::new(fetcher.clone(), &config.selectors)?;
        let threads = ThreadCrawler::new(&config, fetcher, shutdown.clone())?;

        Ok(Self {
            config: Arc::new(config),
            store,
            categories,
            threads,
            extractor,
            write_retry: RetryPolicy::new(3, Duration::from_millis(200), 2.0),
            shutdown,
        })
    }

    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    /// Deletes all records and seen ids before a fresh harvest
    pub fn clear_store(&mut self) -> Result<(), HarvestError> {
        tracing::warn!(store = %self.store.location(), "Clearing record store");
        self.store.clear()?;
        Ok(())
    }

    /// Runs the harvest pipeline once
    ///
    /// Fetch failures are absorbed by the crawlers; only store failures and
    /// an unusable site URL end the run with an error.
    pub async fn run(&mut self) -> Result<HarvestStats, HarvestError> {
        let started = Instant::now();
        let site = &self.config.site;

        let seen = self.store.load_seen_ids()?;
        tracing::info!(
            site = %site.name,
            seen_ids = seen.len(),
            store = %self.store.location(),
            "Starting harvest"
        );

        let categories = self.categories.discover(&site.url).await?;
        let mut stats = HarvestStats {
            categories_found: categories.len(),
            categories_excluded: categories
                .iter()
                .filter(|c| find_exclusion(&self.config.crawler.excluded_categories, &c.name).is_some())
                .count(),
            ..Default::default()
        };

        let mut writer = BatchWriter::new(self.store.as_mut(), &self.extractor, &self.write_retry, seen);
        let crawled = self.threads.crawl(&categories, &mut writer).await;
        writer.merge_into(&mut stats);

        for report in crawled? {
            stats.add_category(&report);
        }

        if self.shutdown.is_triggered() {
            stats.interrupted = true;
            tracing::warn!("Harvest interrupted, stopped scheduling new fetches");
        }

        stats.elapsed = started.elapsed();
        stats.log_summary();
        Ok(stats)
    }
}

/// Extracts fetched threads and persists them batch by batch
struct BatchWriter<'a> {
    store: &'a mut dyn RecordStore,
    extractor: &'a ContentExtractor,
    write_retry: &'a RetryPolicy,
    /// Persisted ids, grown after every successful batch
    seen: HashSet<String>,
    /// Ids handled this run without being persisted (no post body)
    skipped: HashSet<String>,
    records_saved: usize,
    discarded: usize,
    no_content: usize,
    batches: usize,
}

impl<'a> BatchWriter<'a> {
    fn new(
        store: &'a mut dyn RecordStore,
        extractor: &'a ContentExtractor,
        write_retry: &'a RetryPolicy,
        seen: HashSet<String>,
    ) -> Self {
        Self {
            store,
            extractor,
            write_retry,
            seen,
            skipped: HashSet::new(),
            records_saved: 0,
            discarded: 0,
            no_content: 0,
            batches: 0,
        }
    }

    fn merge_into(self, stats: &mut HarvestStats) {
        stats.records_saved += self.records_saved;
        stats.discarded += self.discarded;
        stats.no_content += self.no_content;
        stats.batches += self.batches;
    }
}

impl ThreadSink for BatchWriter<'_> {
    fn is_seen(&self, id: &str) -> bool {
        self.seen.contains(id) || self.skipped.contains(id)
    }

    fn accept(&mut self, category: &Category, threads: Vec<RawThread>) -> Result<(), HarvestError> {
        let mut batch = Batch::default();
        let mut discarded = 0;

        for thread in &threads {
            match self.extractor.extract(thread) {
                Extraction::Record(record) => batch.records.push(record),
                Extraction::Rejected { id, .. } => {
                    discarded += 1;
                    batch.processed_ids.push(id);
                }
                Extraction::NoContent { id } => {
                    self.no_content += 1;
                    self.skipped.insert(id);
                }
            }
        }

        if batch.is_empty() {
            return Ok(());
        }

        let store = &mut *self.store;
        self.write_retry
            .run_blocking("save batch", || store.save_batch(&batch))?;

        self.seen.extend(batch.ids().map(str::to_string));
        self.records_saved += batch.records.len();
        self.discarded += discarded;
        self.batches += 1;

        tracing::info!(
            category = %category.name,
            records = batch.records.len(),
            discarded,
            total_seen = self.seen.len(),
            "Saved batch"
        );
        Ok(())
    }
}

/// Runs a complete harvest with a freshly built coordinator
///
/// # Example
///
/// ```no_run
/// use forum_harvest::config::load_config;
/// use forum_harvest::crawler::{harvest, ShutdownSignal};
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("harvest.toml"))?;
/// let stats = harvest(config, ShutdownSignal::new()).await?;
/// println!("{} new records", stats.records_saved);
/// # Ok(())
/// # }
/// ```
pub async fn harvest(config: Config, shutdown: ShutdownSignal) -> Result<HarvestStats, HarvestError> {
    let mut coordinator = Coordinator::new(config, shutdown)?;
    coordinator.run().await
}
