//! JSON file record store
//!
//! Two artifacts per site: a JSON array of records and a JSON array of seen
//! ids. Files are never modified in place; every rewrite goes through a
//! sibling `.tmp` file that is renamed over the target.
//!
//! A batch first lands in a journal (`<records>.journal`). Renaming the
//! journal into place is the commit point. Both artifacts are rewritten
//! afterwards and the journal is removed. A journal found on open belongs to
//! a committed batch whose rewrite may not have finished, so it is replayed.
//! Replay is idempotent: records already in the log are not appended again.

use crate::config::StoreConfig;
use crate::models::Record;
use crate::storage::traits::{Batch, RecordStore, StorageError, StorageResult};
use serde::de::DeserializeOwned;
use std::collections::{BTreeSet, HashSet};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Record store backed by two JSON files
#[derive(Debug)]
pub struct JsonFileStore {
    records_path: PathBuf,
    seen_path: PathBuf,
    journal_path: PathBuf,
    records: Vec<Record>,
    seen: BTreeSet<String>,
}

impl JsonFileStore {
    /// Opens the store for `site` in the configured data directory
    pub fn from_config(config: &StoreConfig, site: &str) -> StorageResult<Self> {
        let dir = Path::new(&config.data_dir);
        Self::open(
            dir.join(StoreConfig::file_name(&config.records_file, site)),
            dir.join(StoreConfig::file_name(&config.seen_ids_file, site)),
        )
    }

    /// Opens the store, replaying a leftover journal if there is one
    ///
    /// Missing or unreadable artifacts load as empty.
    pub fn open(records_path: impl Into<PathBuf>, seen_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let records_path = records_path.into();
        let seen_path = seen_path.into();
        let journal_path = with_suffix(&records_path, ".journal");

        if let Some(dir) = records_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        if let Some(dir) = seen_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        for path in [&records_path, &seen_path, &journal_path] {
            remove_if_exists(&with_suffix(path, ".tmp"))?;
        }

        let records: Vec<Record> = load_or_empty(&records_path);
        let seen: BTreeSet<String> = load_or_empty::<Vec<String>>(&seen_path).into_iter().collect();

        let mut store = Self {
            records_path,
            seen_path,
            journal_path,
            records,
            seen,
        };
        store.replay_journal()?;

        tracing::debug!(
            records = store.records.len(),
            seen_ids = store.seen.len(),
            path = %store.records_path.display(),
            "Opened JSON record store"
        );
        Ok(store)
    }

    pub fn records_path(&self) -> &Path {
        &self.records_path
    }

    pub fn seen_path(&self) -> &Path {
        &self.seen_path
    }

    pub fn journal_path(&self) -> &Path {
        &self.journal_path
    }

    fn replay_journal(&mut self) -> StorageResult<()> {
        if !self.journal_path.exists() {
            return Ok(());
        }

        let batch = match read_json::<Batch>(&self.journal_path) {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!(
                    path = %self.journal_path.display(),
                    error = %e,
                    "Discarding unreadable batch journal"
                );
                fs::remove_file(&self.journal_path)?;
                return Ok(());
            }
        };

        tracing::warn!(
            records = batch.records.len(),
            ids = batch.processed_ids.len(),
            "Replaying batch journal left by an interrupted run"
        );
        self.apply(&batch)
    }

    /// Rewrites both artifacts with `batch` merged in, then drops the journal
    fn apply(&mut self, batch: &Batch) -> StorageResult<()> {
        let mut records = self.records.clone();
        let mut seen = self.seen.clone();

        let mut present: HashSet<&str> = self.records.iter().map(|r| r.id.as_str()).collect();
        for record in &batch.records {
            if present.insert(record.id.as_str()) {
                records.push(record.clone());
            }
        }
        seen.extend(batch.ids().map(str::to_string));

        write_atomic(&self.records_path, &serde_json::to_vec_pretty(&records)?)?;
        write_atomic(&self.seen_path, &serde_json::to_vec_pretty(&seen)?)?;
        remove_if_exists(&self.journal_path)?;

        self.records = records;
        self.seen = seen;
        Ok(())
    }
}

impl RecordStore for JsonFileStore {
    fn load_seen_ids(&self) -> StorageResult<HashSet<String>> {
        Ok(self.seen.iter().cloned().collect())
    }

    fn load_records(&self) -> StorageResult<Vec<Record>> {
        Ok(self.records.clone())
    }

    fn save_batch(&mut self, batch: &Batch) -> StorageResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        write_atomic(&self.journal_path, &serde_json::to_vec(batch)?)?;
        self.apply(batch)
    }

    fn clear(&mut self) -> StorageResult<()> {
        for path in [&self.records_path, &self.seen_path, &self.journal_path] {
            remove_if_exists(path)?;
        }
        self.records.clear();
        self.seen.clear();
        tracing::info!(path = %self.records_path.display(), "Cleared JSON record store");
        Ok(())
    }

    fn count_records(&self) -> StorageResult<usize> {
        Ok(self.records.len())
    }

    fn count_seen_ids(&self) -> StorageResult<usize> {
        Ok(self.seen.len())
    }

    fn location(&self) -> String {
        format!("{} + {}", self.records_path.display(), self.seen_path.display())
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Writes `bytes` to a sibling temp file, syncs it and renames it over `path`
fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = with_suffix(path, ".tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> StorageResult<T> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn load_or_empty<T: DeserializeOwned + Default>(path: &Path) -> T {
    match read_json(path) {
        Ok(value) => value,
        Err(StorageError::Io(e)) if e.kind() == io::ErrorKind::NotFound => T::default(),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Could not load store file, starting empty");
            T::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(id: &str, category: &str) -> Record {
        Record {
            id: id.to_string(),
            title: format!("Thread {}", id),
            site_url: "https://forum.example.com/".to_string(),
            page_url: format!("https://forum.example.com/threads/t.{}/", id),
            content: Some("body".to_string()),
            published_at: None,
            categories: vec![category.to_string()],
        }
    }

    fn open(dir: &TempDir) -> JsonFileStore {
        JsonFileStore::open(dir.path().join("site_dataset.json"), dir.path().join("site_seen_ids.json")).unwrap()
    }

    #[test]
    fn test_open_empty() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        assert!(store.load_seen_ids().unwrap().is_empty());
        assert_eq!(store.count_records().unwrap(), 0);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);

        store
            .save_batch(&Batch::new(vec![record("10", "general"), record("11", "general")], vec!["12".to_string()]))
            .unwrap();

        let reopened = open(&dir);
        let records = reopened.load_records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "10");

        let seen = reopened.load_seen_ids().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen.contains("12"));
        assert!(!store.journal_path().exists());
    }

    #[test]
    fn test_empty_batch_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        store.save_records(&[]).unwrap();
        assert!(!store.records_path().exists());
        assert!(!store.seen_path().exists());
    }

    #[test]
    fn test_duplicate_record_not_appended() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        store.save_records(&[record("10", "a")]).unwrap();
        store.save_records(&[record("10", "a")]).unwrap();
        assert_eq!(store.count_records().unwrap(), 1);
    }

    #[test]
    fn test_corrupt_files_load_empty() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("site_dataset.json"), "[{ not json").unwrap();
        fs::write(dir.path().join("site_seen_ids.json"), "42").unwrap();

        let store = open(&dir);
        assert_eq!(store.count_records().unwrap(), 0);
        assert!(store.load_seen_ids().unwrap().is_empty());
    }

    #[test]
    fn test_committed_journal_is_replayed() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        store.save_records(&[record("1", "a")]).unwrap();

        // Crash after the commit point: journal present, artifacts stale
        let batch = Batch::new(vec![record("1", "a"), record("2", "a")], vec!["3".to_string()]);
        fs::write(store.journal_path(), serde_json::to_vec(&batch).unwrap()).unwrap();
        drop(store);

        let reopened = open(&dir);
        let ids: Vec<String> = reopened.load_records().unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(reopened.count_seen_ids().unwrap(), 3);
        assert!(!reopened.journal_path().exists());
    }

    #[test]
    fn test_uncommitted_journal_is_ignored() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        store.save_records(&[record("1", "a")]).unwrap();

        // Crash before the commit point: only the journal's temp file exists
        let batch = Batch::new(vec![record("2", "a")], vec![]);
        let pending = with_suffix(store.journal_path(), ".tmp");
        fs::write(&pending, serde_json::to_vec(&batch).unwrap()).unwrap();
        drop(store);

        let reopened = open(&dir);
        assert_eq!(reopened.count_records().unwrap(), 1);
        assert!(!reopened.load_seen_ids().unwrap().contains("2"));
        assert!(!pending.exists());
    }

    #[test]
    fn test_clear() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        store.save_records(&[record("1", "a")]).unwrap();
        store.clear().unwrap();

        assert_eq!(store.count_records().unwrap(), 0);
        assert_eq!(open(&dir).count_seen_ids().unwrap(), 0);
    }

    #[test]
    fn test_category_counts() {
        let dir = TempDir::new().unwrap();
        let mut store = open(&dir);
        store
            .save_records(&[record("1", "news"), record("2", "news"), record("3", "general")])
            .unwrap();

        let counts = store.category_counts().unwrap();
        assert_eq!(counts.get("news"), Some(&2));
        assert_eq!(counts.get("general"), Some(&1));
    }
}
