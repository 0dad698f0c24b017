use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for Forum-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub selectors: SelectorConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

/// The forum being harvested
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Root URL of the forum
    pub url: String,

    /// Logical site name, used to name the persisted artifacts
    pub name: String,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Maximum number of thread fetches in flight within a category
    #[serde(rename = "max-concurrent-requests")]
    pub max_concurrent_requests: u32,

    /// Global request rate; zero or negative disables pacing
    #[serde(rename = "requests-per-second")]
    pub requests_per_second: f64,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout")]
    pub request_timeout: u64,

    /// Threads per persisted batch; 0 persists once per listing page
    #[serde(rename = "batch-size")]
    pub batch_size: usize,

    /// Upper bound on listing pages per category; 0 means unbounded
    #[serde(rename = "max-pages")]
    pub max_pages: u32,

    /// Path segment appended to a category URL for page `n` (n >= 2)
    #[serde(rename = "page-segment")]
    pub page_segment: String,

    /// Category name patterns to skip
    #[serde(rename = "excluded-categories")]
    pub excluded_categories: Vec<String>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_requests: 10,
            requests_per_second: 5.0,
            request_timeout: 20,
            batch_size: 0,
            max_pages: 0,
            page_segment: "page-{n}".to_string(),
            excluded_categories: Vec::new(),
        }
    }
}

/// Retry-with-backoff settings for outbound requests
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (milliseconds)
    #[serde(rename = "initial-delay-ms")]
    pub initial_delay_ms: u64,

    /// Multiplier applied to the delay after each retry
    pub backoff: f64,

    /// Cap on a single delay (milliseconds)
    #[serde(rename = "max-delay-ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay_ms: 1000,
            backoff: 2.0,
            max_delay_ms: 30_000,
        }
    }
}

/// Outbound request identity
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Extra headers sent with every request
    pub headers: BTreeMap<String, String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(
            "Accept".to_string(),
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
        );
        headers.insert("Accept-Language".to_string(), "en-US,en;q=0.9".to_string());

        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            headers,
        }
    }
}

/// Selector chains, tried in order; the first chain entry with a match wins
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub category: Vec<String>,
    pub thread: Vec<String>,
    pub title: Vec<String>,
    pub body: Vec<String>,
    /// Elements removed from the post body before flattening
    pub quote: Vec<String>,
    pub timestamp: Vec<String>,

    /// Path fragment identifying category links in the anchor fallback
    #[serde(rename = "category-path")]
    pub category_path: String,

    /// Path fragment identifying thread links
    #[serde(rename = "thread-path")]
    pub thread_path: String,
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            category: owned(&[".nodeTitle a", ".node-title a", ".forum-title a"]),
            thread: owned(&[
                ".structItem-title a",
                ".discussionListItem .title a",
                ".thread-title a",
                ".title a",
            ]),
            title: owned(&[".p-title-value", "div.titleBar h1", ".thread-title", "h1"]),
            body: owned(&[
                ".message-body .bbWrapper",
                ".messageText",
                ".post-content",
                ".entry-content",
            ]),
            quote: owned(&["blockquote"]),
            timestamp: owned(&["time.u-dt", ".DateTime", "[data-datestring]"]),
            category_path: "/forums/".to_string(),
            thread_path: "/threads/".to_string(),
        }
    }
}

/// Content policy applied to extracted post bodies
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Scripts whose letters cause a post to be discarded
    #[serde(rename = "disallowed-scripts")]
    pub disallowed_scripts: Vec<String>,
}

/// Record store configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// `json` or `sqlite`
    pub backend: String,

    #[serde(rename = "data-dir")]
    pub data_dir: String,

    /// Record log file name; `{site}` is replaced by the site name
    #[serde(rename = "records-file")]
    pub records_file: String,

    /// Seen-id index file name; `{site}` is replaced by the site name
    #[serde(rename = "seen-ids-file")]
    pub seen_ids_file: String,

    /// SQLite database file name; `{site}` is replaced by the site name
    #[serde(rename = "database-file")]
    pub database_file: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: "json".to_string(),
            data_dir: "data".to_string(),
            records_file: "{site}_dataset.json".to_string(),
            seen_ids_file: "{site}_seen_ids.json".to_string(),
            database_file: "{site}.db".to_string(),
        }
    }
}

impl StoreConfig {
    /// Expands a file name template for the given site
    pub fn file_name(template: &str, site: &str) -> String {
        template.replace("{site}", site)
    }
}
