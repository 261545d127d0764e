//! `SQLite`-backed cursor slot.

use crate::Result;
use crate::storage::sqlite::{acquire_lock, open_file, open_in_memory, sqlite_error, timed};
use crate::storage::traits::CursorStore;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::instrument;

const BACKEND: &str = "sqlite_cursor";

/// Default slot name for the home feed.
pub const DEFAULT_SLOT: &str = "home_feed";

/// Persists one named cursor slot in a `feed_cursors` table.
///
/// Several feeds can share a database by using different slot names.
pub struct SqliteCursorStore {
    conn: Mutex<Connection>,
    slot: String,
}

impl SqliteCursorStore {
    /// Opens (or creates) the slot in a database file.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(db_path: impl Into<PathBuf>, slot: impl Into<String>) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(open_file(&db_path.into())?),
            slot: slot.into(),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Creates an in-memory slot (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn in_memory() -> Result<Self> {
        let store = Self {
            conn: Mutex::new(open_in_memory()?),
            slot: DEFAULT_SLOT.to_string(),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Returns the slot name.
    #[must_use]
    pub fn slot(&self) -> &str {
        &self.slot
    }

    fn initialize(&self) -> Result<()> {
        acquire_lock(&self.conn)
            .execute(
                "CREATE TABLE IF NOT EXISTS feed_cursors (
                    slot TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at INTEGER NOT NULL
                )",
                [],
            )
            .map(|_| ())
            .map_err(|e| sqlite_error("create_feed_cursors_table", &e))
    }
}

impl CursorStore for SqliteCursorStore {
    #[instrument(skip(self), fields(operation = "get", backend = BACKEND, slot = %self.slot))]
    fn get(&self) -> Result<Option<String>> {
        timed(BACKEND, "get", || {
            acquire_lock(&self.conn)
                .query_row(
                    "SELECT value FROM feed_cursors WHERE slot = ?1",
                    params![self.slot],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| sqlite_error("get_cursor", &e))
        })
    }

    #[instrument(skip(self, value), fields(operation = "set", backend = BACKEND, slot = %self.slot, len = value.len()))]
    fn set(&self, value: &str) -> Result<()> {
        timed(BACKEND, "set", || {
            acquire_lock(&self.conn)
                .execute(
                    "INSERT INTO feed_cursors (slot, value, updated_at) VALUES (?1, ?2, ?3)
                     ON CONFLICT(slot) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                    params![self.slot, value, chrono::Utc::now().timestamp_millis()],
                )
                .map(|_| ())
                .map_err(|e| sqlite_error("set_cursor", &e))
        })
    }

    #[instrument(skip(self), fields(operation = "clear", backend = BACKEND, slot = %self.slot))]
    fn clear(&self) -> Result<()> {
        timed(BACKEND, "clear", || {
            acquire_lock(&self.conn)
                .execute("DELETE FROM feed_cursors WHERE slot = ?1", params![self.slot])
                .map(|_| ())
                .map_err(|e| sqlite_error("clear_cursor", &e))
        })
    }
}
