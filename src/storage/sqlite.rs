//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the RecordStore
//! trait. Each batch is written inside a single transaction.

use crate::models::Record;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Batch, RecordStore, StorageError, StorageResult};
use chrono::Utc;
use rusqlite::{params, Connection, ErrorCode};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// SQLite record store backend
pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Opens or creates the database at `path`
    ///
    /// A file that is not a SQLite database is moved aside (same name,
    /// `.corrupt` extension) and a fresh database is created in its place.
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }

        let conn = match Self::connect(path) {
            Err(StorageError::Sqlite(rusqlite::Error::SqliteFailure(e, _)))
                if e.code == ErrorCode::NotADatabase =>
            {
                let aside = path.with_extension("corrupt");
                tracing::warn!(
                    path = %path.display(),
                    moved_to = %aside.display(),
                    "Database file is corrupt, starting empty"
                );
                std::fs::rename(path, &aside)?;
                Self::connect(path)?
            }
            other => other?,
        };

        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    fn connect(path: &Path) -> StorageResult<Connection> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = FULL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;
        Ok(conn)
    }

    /// Creates an in-memory database
    pub fn in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn, path: None })
    }
}

impl RecordStore for SqliteStore {
    fn load_seen_ids(&self) -> StorageResult<HashSet<String>> {
        let mut stmt = self.conn.prepare("SELECT id FROM seen_ids")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<HashSet<String>, _>>()?;
        Ok(ids)
    }

    fn load_records(&self) -> StorageResult<Vec<Record>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, site_url, page_url, content, published_at, categories
             FROM records ORDER BY seq",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    Record {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        site_url: row.get(2)?,
                        page_url: row.get(3)?,
                        content: row.get(4)?,
                        published_at: row.get(5)?,
                        categories: Vec::new(),
                    },
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(mut record, categories)| -> StorageResult<Record> {
                record.categories = serde_json::from_str(&categories)?;
                Ok(record)
            })
            .collect()
    }

    fn save_batch(&mut self, batch: &Batch) -> StorageResult<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        {
            let mut insert_record = tx.prepare(
                "INSERT OR IGNORE INTO records
                 (id, title, site_url, page_url, content, published_at, categories, saved_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for record in &batch.records {
                insert_record.execute(params![
                    record.id,
                    record.title,
                    record.site_url,
                    record.page_url,
                    record.content,
                    record.published_at,
                    serde_json::to_string(&record.categories)?,
                    now,
                ])?;
            }

            let mut insert_id =
                tx.prepare("INSERT OR IGNORE INTO seen_ids (id, processed_at) VALUES (?1, ?2)")?;
            for id in batch.ids() {
                insert_id.execute(params![id, now])?;
            }
        }
        tx.commit()?;

        Ok(())
    }

    fn clear(&mut self) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM records", [])?;
        tx.execute("DELETE FROM seen_ids", [])?;
        tx.commit()?;
        tracing::info!(location = %self.location(), "Cleared SQLite record store");
        Ok(())
    }

    fn count_records(&self) -> StorageResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn count_seen_ids(&self) -> StorageResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM seen_ids", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn category_counts(&self) -> StorageResult<BTreeMap<String, usize>> {
        let mut stmt = self.conn.prepare(
            "SELECT j.value, COUNT(*) FROM records, json_each(records.categories) AS j
             GROUP BY j.value",
        )?;
        let counts = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as usize))
            })?
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(counts)
    }

    fn location(&self) -> String {
        match &self.path {
            Some(path) => path.display().to_string(),
            None => ":memory:".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(id: &str, categories: &[&str]) -> Record {
        Record {
            id: id.to_string(),
            title: format!("Thread {}", id),
            site_url: "https://forum.example.com/".to_string(),
            page_url: format!("https://forum.example.com/threads/t.{}/", id),
            content: Some("Привет".to_string()),
            published_at: Some("2023-01-02T03:04:05+0000".to_string()),
            categories: categories.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_create_in_memory() {
        let store = SqliteStore::in_memory().unwrap();
        assert_eq!(store.count_records().unwrap(), 0);
        assert!(store.load_seen_ids().unwrap().is_empty());
    }

    #[test]
    fn test_save_batch_records_and_ids() {
        let mut store = SqliteStore::in_memory().unwrap();
        store
            .save_batch(&Batch::new(
                vec![record("10", &["general"]), record("11", &["general"])],
                vec!["12".to_string()],
            ))
            .unwrap();

        let records = store.load_records().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], record("10", &["general"]));

        let seen = store.load_seen_ids().unwrap();
        assert_eq!(seen.len(), 3);
        assert!(seen.contains("12"));
    }

    #[test]
    fn test_duplicate_ids_are_ignored() {
        let mut store = SqliteStore::in_memory().unwrap();
        store.save_records(&[record("1", &[])]).unwrap();
        store.save_records(&[record("1", &[])]).unwrap();
        store.mark_processed(&["1".to_string()]).unwrap();

        assert_eq!(store.count_records().unwrap(), 1);
        assert_eq!(store.count_seen_ids().unwrap(), 1);
    }

    #[test]
    fn test_category_counts() {
        let mut store = SqliteStore::in_memory().unwrap();
        store
            .save_records(&[record("1", &["news", "local"]), record("2", &["news"])])
            .unwrap();

        let counts = store.category_counts().unwrap();
        assert_eq!(counts.get("news"), Some(&2));
        assert_eq!(counts.get("local"), Some(&1));
    }

    #[test]
    fn test_clear() {
        let mut store = SqliteStore::in_memory().unwrap();
        store.save_records(&[record("1", &[])]).unwrap();
        store.clear().unwrap();
        assert_eq!(store.count_records().unwrap(), 0);
        assert_eq!(store.count_seen_ids().unwrap(), 0);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("site.db");

        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.save_records(&[record("7", &["general"])]).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.count_records().unwrap(), 1);
        assert!(store.load_seen_ids().unwrap().contains("7"));
    }

    #[test]
    fn test_corrupt_database_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("site.db");
        std::fs::write(&path, b"this is definitely not a sqlite database file, just text").unwrap();

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.count_records().unwrap(), 0);
        assert!(path.with_extension("corrupt").exists());
    }
}
