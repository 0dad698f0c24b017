//! Storage module for persisting harvested records
//!
//! This module owns the two durable artifacts of a site:
//! - The record log, appended to batch by batch
//! - The seen-id set used to skip already processed threads
//!
//! Backends implement [`RecordStore`]; [`open_store`] picks one from the
//! configuration.

mod json;
mod schema;
mod sqlite;
mod traits;

pub use json::JsonFileStore;
pub use sqlite::SqliteStore;
pub use traits::{Batch, RecordStore, StorageError, StorageResult};

use crate::config::{Config, StoreConfig};
use std::path::Path;

/// Opens the record store selected by `[store] backend`
///
/// # Arguments
///
/// * `config` - Harvester configuration; the site name parameterizes file names
///
/// # Returns
///
/// * `Ok(Box<dyn RecordStore>)` - Opened store, with any leftover state recovered
/// * `Err(StorageError)` - Unknown backend or the data directory is unusable
pub fn open_store(config: &Config) -> StorageResult<Box<dyn RecordStore>> {
    let store = &config.store;
    let site = &config.site.name;

    match store.backend.as_str() {
        "json" => Ok(Box::new(JsonFileStore::from_config(store, site)?)),
        "sqlite" => {
            let path = Path::new(&store.data_dir).join(StoreConfig::file_name(&store.database_file, site));
            Ok(Box::new(SqliteStore::open(&path)?))
        }
        other => Err(StorageError::UnknownBackend(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use tempfile::TempDir;

    fn config(dir: &TempDir, backend: &str) -> Config {
        let mut config = parse_config(
            r#"
            [site]
            url = "https://forum.example.com/"
            name = "example"
            "#,
        )
        .unwrap();
        config.store.backend = backend.to_string();
        config.store.data_dir = dir.path().display().to_string();
        config
    }

    #[test]
    fn test_open_json_store() {
        let dir = TempDir::new().unwrap();
        let mut store = open_store(&config(&dir, "json")).unwrap();
        store.mark_processed(&["1".to_string()]).unwrap();

        assert!(dir.path().join("example_seen_ids.json").exists());
        assert!(store.location().contains("example_dataset.json"));
    }

    #[test]
    fn test_open_sqlite_store() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&config(&dir, "sqlite")).unwrap();

        assert!(dir.path().join("example.db").exists());
        assert_eq!(store.count_records().unwrap(), 0);
    }

    #[test]
    fn test_unknown_backend() {
        let dir = TempDir::new().unwrap();
        let result = open_store(&config(&dir, "redis"));
        assert!(matches!(result, Err(StorageError::UnknownBackend(_))));
    }
}
