use chrono::{SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;

pub const TRAINING_SNAPSHOT_KEY: &str = "training.snapshot";
pub const EXPORT_KEY_PREFIX: &str = "export.";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct StoredDocument {
    pub key: String,
    pub value: String,
    pub updated_at: String,
}

/// Key-value store for JSON documents (session exports, training snapshots).
/// One connection behind a mutex; every query goes through `with_connection`.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            // Best effort; open() reports the real failure.
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "
            -- JSON documents keyed by name
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_kv_updated ON kv(updated_at);
            ",
        )?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        f(&conn)
    }

    pub fn put(&self, key: &str, value: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true);
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, now],
            )?;
            Ok(())
        })
    }

    pub fn get(&self, key: &str) -> Result<Option<StoredDocument>> {
        self.with_connection(|conn| {
            conn.query_row(
                "SELECT key, value, updated_at FROM kv WHERE key = ?1",
                [key],
                |row| {
                    Ok(StoredDocument {
                        key: row.get(0)?,
                        value: row.get(1)?,
                        updated_at: row.get(2)?,
                    })
                },
            )
            .optional()
        })
    }

    /// Keys starting with `prefix`, newest first.
    pub fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT key FROM kv WHERE substr(key, 1, length(?1)) = ?1 ORDER BY updated_at DESC, key DESC",
            )?;
            let keys = stmt.query_map([prefix], |row| row.get(0))?;
            keys.collect()
        })
    }

    pub fn delete(&self, key: &str) -> Result<bool> {
        self.with_connection(|conn| {
            let removed = conn.execute("DELETE FROM kv WHERE key = ?1", [key])?;
            Ok(removed > 0)
        })
    }

    pub fn save_json<T: Serialize>(&self, key: &str, value: &T) -> crate::error::Result<()> {
        let raw = serde_json::to_string(value)?;
        self.put(key, &raw)?;
        Ok(())
    }

    pub fn load_json<T: DeserializeOwned>(&self, key: &str) -> crate::error::Result<Option<T>> {
        match self.get(key)? {
            Some(doc) => Ok(Some(serde_json::from_str(&doc.value)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Snapshot {
        history: Vec<f64>,
        interval: f64,
    }

    #[test]
    fn test_put_overwrites() {
        let store = Store::open_in_memory().unwrap();
        store.put("a", "1").unwrap();
        store.put("a", "2").unwrap();
        assert_eq!(store.get("a").unwrap().unwrap().value, "2");
        assert!(store.get("missing").unwrap().is_none());
    }

    #[test]
    fn test_json_documents() {
        let store = Store::open_in_memory().unwrap();
        let snapshot = Snapshot { history: vec![0.4, 0.6], interval: 66.0 };
        store.save_json(TRAINING_SNAPSHOT_KEY, &snapshot).unwrap();
        let loaded: Option<Snapshot> = store.load_json(TRAINING_SNAPSHOT_KEY).unwrap();
        assert_eq!(loaded, Some(snapshot));
    }

    #[test]
    fn test_prefix_listing_and_delete() {
        let store = Store::open_in_memory().unwrap();
        store.put("export.1", "{}").unwrap();
        store.put("export.2", "{}").unwrap();
        store.put("training.snapshot", "{}").unwrap();
        let keys = store.keys_with_prefix(EXPORT_KEY_PREFIX).unwrap();
        assert_eq!(keys.len(), 2);
        assert!(store.delete("export.1").unwrap());
        assert!(!store.delete("export.1").unwrap());
        assert_eq!(
            store.keys_with_prefix(EXPORT_KEY_PREFIX).unwrap(),
            vec!["export.2".to_string()]
        );
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("coinpal.db");
        {
            let store = Store::open(&path).unwrap();
            store.put("k", "v").unwrap();
        }
        let reopened = Store::open(&path).unwrap();
        assert_eq!(reopened.get("k").unwrap().unwrap().value, "v");
    }
}
