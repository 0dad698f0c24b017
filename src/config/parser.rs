use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at start-up so a harvest run can be matched to the configuration
/// that produced it.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_minimal_config_uses_defaults() {
        let config_content = r#"
[site]
url = "https://forum.example.com/"
name = "example_forum"
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.site.name, "example_forum");
        assert_eq!(config.crawler.max_concurrent_requests, 10);
        assert_eq!(config.crawler.requests_per_second, 5.0);
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.store.backend, "json");
        assert_eq!(config.selectors.thread_path, "/threads/");
        assert_eq!(config.selectors.body[0], ".message-body .bbWrapper");
        assert!(config.filter.disallowed_scripts.is_empty());
    }

    #[test]
    fn test_load_full_config() {
        let config_content = r#"
[site]
url = "https://forum.example.com/"
name = "example_forum"

[crawler]
max-concurrent-requests = 4
requests-per-second = 2.5
request-timeout = 10
batch-size = 25
excluded-categories = ["Archive*"]

[retry]
max-attempts = 2
initial-delay-ms = 50
backoff = 3.0

[http]
user-agent = "HarvestBot/1.0"
headers = { "Accept-Language" = "mk,en;q=0.5" }

[selectors]
thread = [".topic a"]

[filter]
disallowed-scripts = ["latin"]

[store]
backend = "sqlite"
data-dir = "/var/lib/harvest"
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.crawler.max_concurrent_requests, 4);
        assert_eq!(config.crawler.batch_size, 25);
        assert_eq!(config.crawler.excluded_categories, vec!["Archive*"]);
        assert_eq!(config.retry.backoff, 3.0);
        assert_eq!(config.retry.max_delay_ms, 30_000);
        assert_eq!(config.http.user_agent, "HarvestBot/1.0");
        assert_eq!(
            config.http.headers.get("Accept-Language").map(String::as_str),
            Some("mk,en;q=0.5")
        );
        assert_eq!(config.selectors.thread, vec![".topic a"]);
        // Untouched chains keep their defaults
        assert_eq!(config.selectors.title[0], ".p-title-value");
        assert_eq!(config.filter.disallowed_scripts, vec!["latin"]);
        assert_eq!(config.store.backend, "sqlite");
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/harvest.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_site_section_is_rejected() {
        let result = parse_config("[crawler]\nmax-concurrent-requests = 2\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let config_content = r#"
[site]
url = "https://forum.example.com/"
name = "example_forum"

[crawler]
max-concurrent-requests = 0
"#;

        let file = create_temp_config(config_content);
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }
}
