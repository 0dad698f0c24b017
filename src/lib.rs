//! Forum-Harvest: an incremental forum record harvester
//!
//! This crate discovers the categories of a paginated web forum, walks their
//! thread listings, extracts the main post of every thread it has not seen
//! before and persists the resulting records in crash-safe batches.

pub mod config;
pub mod crawler;
pub mod models;
pub mod output;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Forum-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector in config: {0}")]
    InvalidSelector(String),

    #[error("Invalid category pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("No thread id in URL: {0}")]
    MissingThreadId(String),
}

/// Result type alias for Forum-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{harvest, Coordinator, ShutdownSignal};
pub use models::{Category, RawThread, Record, ThreadRef};
pub use storage::{open_store, RecordStore};
pub use url::{normalize_url, thread_id_from_url};
