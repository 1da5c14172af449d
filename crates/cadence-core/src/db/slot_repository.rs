//! `SQLite`-backed snapshot slots

use std::path::Path;
use std::sync::Arc;

use rusqlite::{params, OptionalExtension};

use super::Database;
use crate::error::Result;
use crate::store::SnapshotSlot;

/// Snapshot slots stored as rows of the `kv_slots` table
#[derive(Debug, Clone)]
pub struct SqliteSlotStore {
    db: Arc<Database>,
}

impl SqliteSlotStore {
    pub const fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Open (or create) the slot database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Arc::new(Database::open(path)?)))
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Arc::new(Database::open_in_memory()?)))
    }

    /// Every slot key currently stored
    pub fn keys(&self) -> Result<Vec<String>> {
        let conn = self.db.connection();
        let mut stmt = conn.prepare("SELECT key FROM kv_slots ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}

impl SnapshotSlot for SqliteSlotStore {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .db
            .connection()
            .query_row(
                "SELECT value FROM kv_slots WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        self.db.connection().execute(
            "INSERT INTO kv_slots (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.db
            .connection()
            .execute("DELETE FROM kv_slots WHERE key = ?1", params![key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Note, NoteDraft};
    use crate::store::LocalStore;
    use crate::time::system_time;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_read_write_remove() {
        let slots = SqliteSlotStore::open_in_memory().unwrap();
        assert_eq!(slots.read("timers").unwrap(), None);

        slots.write("timers", "[]").unwrap();
        slots.write("timers", "[1]").unwrap();
        assert_eq!(slots.read("timers").unwrap().as_deref(), Some("[1]"));
        assert_eq!(slots.keys().unwrap(), vec!["timers".to_string()]);

        slots.remove("timers").unwrap();
        assert_eq!(slots.read("timers").unwrap(), None);
    }

    #[test]
    fn test_store_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cadence.db");

        let created = {
            let slots = Arc::new(SqliteSlotStore::open(&path).unwrap());
            let store = LocalStore::<Note>::open(slots, system_time());
            store.create(NoteDraft::new("Groceries", "eggs")).unwrap()
        };

        let slots = Arc::new(SqliteSlotStore::open(&path).unwrap());
        let store = LocalStore::<Note>::open(slots, system_time());
        assert_eq!(store.get_all(), vec![created]);
    }
}
