//! Database connection management

use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::Connection;

use super::migrations;
use crate::error::Result;

/// `SQLite` database holding the snapshot slots
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open a database at the given path, creating it (and its parent
    /// directory) if it doesn't exist
    ///
    /// Runs migrations automatically.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        let database = Self {
            conn: Mutex::new(conn),
        };
        database.configure()?;
        database.migrate()?;
        tracing::debug!("Opened snapshot database at {}", path.display());
        Ok(database)
    }

    /// Open an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        let database = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        database.configure()?;
        database.migrate()?;
        Ok(database)
    }

    fn configure(&self) -> Result<()> {
        let conn = self.connection();
        // In-memory databases report "memory" instead of switching to WAL
        conn.query_row("PRAGMA journal_mode = WAL;", [], |_| Ok(()))
            .ok();
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        Ok(())
    }

    fn migrate(&self) -> Result<()> {
        migrations::run(&self.connection())
    }

    /// Lock the underlying connection
    pub fn connection(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}
