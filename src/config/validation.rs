use crate::config::types::{
    Config, CrawlerConfig, RetryConfig, SelectorConfig, SiteConfig, StoreConfig,
};
use crate::crawler::{Script, SelectorChain};
use crate::ConfigError;
use url::Url;

/// Lowest accepted non-zero request rate
const MIN_REQUESTS_PER_SECOND: f64 = 0.001;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_crawler_config(&config.crawler)?;
    validate_retry_config(&config.retry)?;
    validate_selector_config(&config.selectors)?;
    validate_store_config(&config.store)?;

    for name in &config.filter.disallowed_scripts {
        name.parse::<Script>()?;
    }

    Ok(())
}

fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid site url '{}': {}", config.url, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Site url '{}' must use http or https",
            config.url
        )));
    }

    if config.name.is_empty() {
        return Err(ConfigError::Validation(
            "site name cannot be empty".to_string(),
        ));
    }

    // The name ends up in file and table names
    if !config
        .name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "site name must contain only ASCII letters, digits, '-' and '_', got '{}'",
            config.name
        )));
    }

    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_requests < 1 || config.max_concurrent_requests > 100 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-requests must be between 1 and 100, got {}",
            config.max_concurrent_requests
        )));
    }

    if !config.requests_per_second.is_finite() {
        return Err(ConfigError::Validation(
            "requests-per-second must be a finite number".to_string(),
        ));
    }

    if config.requests_per_second > 0.0 && config.requests_per_second < MIN_REQUESTS_PER_SECOND {
        return Err(ConfigError::Validation(format!(
            "requests-per-second must be 0 (unlimited) or at least {}, got {}",
            MIN_REQUESTS_PER_SECOND, config.requests_per_second
        )));
    }

    if config.request_timeout == 0 {
        return Err(ConfigError::Validation(
            "request-timeout must be >= 1 second".to_string(),
        ));
    }

    if !config.page_segment.contains("{n}") {
        return Err(ConfigError::Validation(format!(
            "page-segment must contain the '{{n}}' placeholder, got '{}'",
            config.page_segment
        )));
    }

    for pattern in &config.excluded_categories {
        if pattern.trim().is_empty() {
            return Err(ConfigError::InvalidPattern(
                "excluded category pattern cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "max-attempts must be >= 1, got {}",
            config.max_attempts
        )));
    }

    if !config.backoff.is_finite() || config.backoff < 1.0 {
        return Err(ConfigError::Validation(format!(
            "backoff must be >= 1.0, got {}",
            config.backoff
        )));
    }

    Ok(())
}

fn validate_selector_config(config: &SelectorConfig) -> Result<(), ConfigError> {
    for (name, chain) in [
        ("category", &config.category),
        ("thread", &config.thread),
        ("title", &config.title),
        ("body", &config.body),
        ("timestamp", &config.timestamp),
    ] {
        if chain.is_empty() {
            return Err(ConfigError::Validation(format!(
                "selector chain '{}' cannot be empty",
                name
            )));
        }
        SelectorChain::compile(chain)?;
    }

    // An empty quote chain is allowed: nothing gets stripped
    SelectorChain::compile(&config.quote)?;

    if config.category_path.is_empty() || config.thread_path.is_empty() {
        return Err(ConfigError::Validation(
            "category-path and thread-path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_store_config(config: &StoreConfig) -> Result<(), ConfigError> {
    match config.backend.as_str() {
        "json" | "sqlite" => {}
        other => {
            return Err(ConfigError::Validation(format!(
                "unsupported store backend '{}', expected 'json' or 'sqlite'",
                other
            )))
        }
    }

    if config.data_dir.is_empty() {
        return Err(ConfigError::Validation(
            "data-dir cannot be empty".to_string(),
        ));
    }

    for (key, template) in [
        ("records-file", &config.records_file),
        ("seen-ids-file", &config.seen_ids_file),
        ("database-file", &config.database_file),
    ] {
        if template.is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", key)));
        }
    }

    if config.records_file == config.seen_ids_file {
        return Err(ConfigError::Validation(
            "records-file and seen-ids-file must differ".to_string(),
        ));
    }

    Ok(())
}
