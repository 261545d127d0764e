//! `SQLite`-backed interaction log.

use crate::models::{ContentId, Interaction, InteractionKind, NewInteraction};
use crate::storage::sqlite::{
    INTERACTION_COLUMNS, InteractionRow, acquire_lock, open_file, open_in_memory, sqlite_error,
    timed,
};
use crate::storage::traits::{InteractionLog, ViewedStateProvider};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::instrument;

const BACKEND: &str = "sqlite_interactions";

/// `SQLite`-backed interaction log.
///
/// # Concurrency Model
///
/// Uses a `Mutex<Connection>` because `rusqlite::Connection` is not `Sync`.
/// WAL mode and `busy_timeout` let a cursor store hold a second connection to
/// the same file.
///
/// # Schema
///
/// - `interactions`: one row per content id. `feed_index` is an
///   `AUTOINCREMENT` key, so positions are never reused even after external
///   deletes.
/// - `meta`: key/value pairs (installation id).
pub struct SqliteInteractionLog {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteInteractionLog {
    /// Opens (or creates) the log in a database file.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let conn = open_file(&db_path)?;
        let log = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };
        log.initialize()?;
        Ok(log)
    }

    /// Creates an in-memory log (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn in_memory() -> Result<Self> {
        let log = Self {
            conn: Mutex::new(open_in_memory()?),
            db_path: None,
        };
        log.initialize()?;
        Ok(log)
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS interactions (
                feed_index INTEGER PRIMARY KEY AUTOINCREMENT,
                content_id TEXT NOT NULL UNIQUE,
                body TEXT NOT NULL,
                image_url TEXT,
                thumbnail_url TEXT,
                published_at INTEGER,
                created_at INTEGER NOT NULL,
                popularity INTEGER NOT NULL DEFAULT 0,
                tags TEXT,
                viewed_at INTEGER,
                saved_at INTEGER,
                shared_at INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_interactions_viewed
                ON interactions(viewed_at) WHERE viewed_at IS NOT NULL;
            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )
        .map_err(|e| sqlite_error("create_interactions_schema", &e))
    }

    /// Returns the installation seed, creating it on first call.
    ///
    /// The seed is derived from a UUID stored in the `meta` table, so it is
    /// stable for the lifetime of the database.
    ///
    /// # Errors
    ///
    /// Returns an error if the `meta` table cannot be read or written.
    pub fn installation_seed(&self) -> Result<u64> {
        let conn = acquire_lock(&self.conn);
        let existing: Option<String> = conn
            .query_row(
                "SELECT value FROM meta WHERE key = 'installation_id'",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| sqlite_error("read_installation_id", &e))?;

        let installation_id = if let Some(id) = existing {
            id
        } else {
            let id = uuid::Uuid::new_v4().to_string();
            conn.execute(
                "INSERT OR IGNORE INTO meta (key, value) VALUES ('installation_id', ?1)",
                params![id],
            )
            .map_err(|e| sqlite_error("write_installation_id", &e))?;
            tracing::info!(installation_id = %id, "Created installation id");
            id
        };

        Ok(seed_from_installation_id(&installation_id))
    }

    fn fetch_by_id(conn: &Connection, id: &str) -> Result<Option<Interaction>> {
        conn.query_row(
            &format!("SELECT {INTERACTION_COLUMNS} FROM interactions WHERE content_id = ?1"),
            params![id],
            InteractionRow::from_row,
        )
        .optional()
        .map(|row| row.map(InteractionRow::into_interaction))
        .map_err(|e| sqlite_error("get_interaction", &e))
    }

    fn select_by_ids(conn: &Connection, ids: &[ContentId]) -> Result<Vec<Interaction>> {
        let placeholders: Vec<String> = (1..=ids.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "SELECT {INTERACTION_COLUMNS} FROM interactions WHERE content_id IN ({})",
            placeholders.join(", ")
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| sqlite_error("prepare_get_by_ids", &e))?;

        let rows = stmt
            .query_map(
                rusqlite::params_from_iter(ids.iter().map(ContentId::as_str)),
                InteractionRow::from_row,
            )
            .map_err(|e| sqlite_error("get_by_ids", &e))?;

        let mut by_id: HashMap<String, Interaction> = HashMap::with_capacity(ids.len());
        for row in rows {
            let interaction = row
                .map_err(|e| sqlite_error("get_by_ids_row", &e))?
                .into_interaction();
            by_id.insert(interaction.content_id.as_str().to_string(), interaction);
        }

        Ok(ids
            .iter()
            .filter_map(|id| by_id.remove(id.as_str()))
            .collect())
    }
}

impl InteractionLog for SqliteInteractionLog {
    #[instrument(skip(self), fields(operation = "get_page", backend = BACKEND))]
    fn get_page(&self, after_index: Option<i64>, limit: usize) -> Result<Vec<Interaction>> {
        timed(BACKEND, "get_page", || {
            let conn = acquire_lock(&self.conn);
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {INTERACTION_COLUMNS} FROM interactions
                     WHERE feed_index > ?1 ORDER BY feed_index ASC LIMIT ?2"
                ))
                .map_err(|e| sqlite_error("prepare_get_page", &e))?;

            let limit = i64::try_from(limit).unwrap_or(i64::MAX);
            let rows = stmt
                .query_map(
                    params![after_index.unwrap_or(i64::MIN), limit],
                    InteractionRow::from_row,
                )
                .map_err(|e| sqlite_error("get_page", &e))?;

            rows.map(|row| {
                row.map(InteractionRow::into_interaction)
                    .map_err(|e| sqlite_error("get_page_row", &e))
            })
            .collect()
        })
    }

    #[instrument(skip(self), fields(operation = "count", backend = BACKEND))]
    fn count(&self) -> Result<usize> {
        timed(BACKEND, "count", || {
            let conn = acquire_lock(&self.conn);
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM interactions", [], |row| row.get(0))
                .map_err(|e| sqlite_error("count", &e))?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
    }

    #[instrument(skip(self), fields(operation = "last_index", backend = BACKEND))]
    fn last_index(&self) -> Result<Option<i64>> {
        timed(BACKEND, "last_index", || {
            let conn = acquire_lock(&self.conn);
            conn.query_row("SELECT MAX(feed_index) FROM interactions", [], |row| row.get(0))
                .map_err(|e| sqlite_error("last_index", &e))
        })
    }

    #[instrument(skip(self, ids), fields(operation = "get_by_ids", backend = BACKEND, count = ids.len()))]
    fn get_by_ids(&self, ids: &[ContentId]) -> Result<Vec<Interaction>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        timed(BACKEND, "get_by_ids", || {
            let conn = acquire_lock(&self.conn);
            Self::select_by_ids(&conn, ids)
        })
    }

    #[instrument(skip(self, row), fields(operation = "append", backend = BACKEND, content.id = %row.content.id))]
    fn append(&self, row: NewInteraction) -> Result<Interaction> {
        timed(BACKEND, "append", || {
            let conn = acquire_lock(&self.conn);
            let content = &row.content;
            let tags = serde_json::to_string(&content.tags)
                .map_err(|e| Error::operation("encode_tags", e))?;

            conn.execute(
                "INSERT OR IGNORE INTO interactions (content_id, body, image_url, thumbnail_url,
                    published_at, created_at, popularity, tags, viewed_at, saved_at, shared_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    content.id.as_str(),
                    content.body,
                    content.image_url.as_deref(),
                    content.thumbnail_url.as_deref(),
                    content.published_at.map(|t| t.timestamp_millis()),
                    content.created_at.timestamp_millis(),
                    content.popularity,
                    tags,
                    row.viewed_at.map(|t| t.timestamp_millis()),
                    row.saved_at.map(|t| t.timestamp_millis()),
                    row.shared_at.map(|t| t.timestamp_millis()),
                ],
            )
            .map_err(|e| sqlite_error("append_interaction", &e))?;

            Self::fetch_by_id(&conn, content.id.as_str())?.ok_or_else(|| Error::OperationFailed {
                operation: "append_interaction".to_string(),
                cause: format!("row for {} missing after insert", content.id),
            })
        })
    }

    #[instrument(skip(self), fields(operation = "record", backend = BACKEND, content.id = %id))]
    fn record(&self, id: &ContentId, kind: InteractionKind, at: DateTime<Utc>) -> Result<bool> {
        timed(BACKEND, "record", || {
            let conn = acquire_lock(&self.conn);
            let sql = match kind {
                InteractionKind::Viewed => {
                    "UPDATE interactions SET viewed_at = ?2 WHERE content_id = ?1"
                },
                InteractionKind::Saved => "UPDATE interactions SET saved_at = ?2 WHERE content_id = ?1",
                InteractionKind::Shared => {
                    "UPDATE interactions SET shared_at = ?2 WHERE content_id = ?1"
                },
            };
            let updated = conn
                .execute(sql, params![id.as_str(), at.timestamp_millis()])
                .map_err(|e| sqlite_error("record_interaction", &e))?;
            Ok(updated > 0)
        })
    }
}

impl ViewedStateProvider for SqliteInteractionLog {
    #[instrument(skip(self, ids), fields(operation = "unviewed_ids", backend = BACKEND, count = ids.len()))]
    fn unviewed_ids(&self, ids: &[ContentId]) -> Result<Vec<ContentId>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        timed(BACKEND, "unviewed_ids", || {
            let conn = acquire_lock(&self.conn);
            let viewed: HashSet<ContentId> = Self::select_by_ids(&conn, ids)?
                .into_iter()
                .filter(|row| row.viewed_at.is_some())
                .map(|row| row.content_id)
                .collect();
            Ok(ids.iter().filter(|id| !viewed.contains(*id)).cloned().collect())
        })
    }
}

/// Derives a 64-bit ordering seed from an installation id.
#[must_use]
pub fn seed_from_installation_id(installation_id: &str) -> u64 {
    let digest = Sha256::digest(installation_id.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentItem;
    use chrono::TimeZone;

    fn item(id: &str) -> ContentItem {
        ContentItem::new(id, format!("body of {id}"))
            .with_media(format!("https://img/{id}.png"), format!("https://thumb/{id}.png"))
            .with_created_at(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
            .with_tag("daily")
    }

    #[test]
    fn test_append_assigns_increasing_indices() {
        let log = SqliteInteractionLog::in_memory().unwrap();
        assert_eq!(log.last_index().unwrap(), None);
        let a = log.append(NewInteraction::surfaced(item("a"))).unwrap();
        let b = log.append(NewInteraction::surfaced(item("b"))).unwrap();
        assert!(b.feed_index > a.feed_index);
        assert_eq!(log.count().unwrap(), 2);
        assert_eq!(log.last_index().unwrap(), Some(b.feed_index));
    }

    #[test]
    fn test_append_existing_id_keeps_position() {
        let log = SqliteInteractionLog::in_memory().unwrap();
        let first = log.append(NewInteraction::surfaced(item("a"))).unwrap();
        log.append(NewInteraction::surfaced(item("b"))).unwrap();
        let again = log.append(NewInteraction::surfaced(item("a"))).unwrap();
        assert_eq!(first.feed_index, again.feed_index);
        assert_eq!(log.count().unwrap(), 2);
    }

    #[test]
    fn test_get_page_after_index() {
        let log = SqliteInteractionLog::in_memory().unwrap();
        let rows: Vec<_> = ["a", "b", "c", "d"]
            .iter()
            .map(|id| log.append(NewInteraction::surfaced(item(id))).unwrap())
            .collect();

        let first = log.get_page(None, 2).unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].content_id.as_str(), "a");

        let rest = log.get_page(Some(rows[1].feed_index), 10).unwrap();
        let ids: Vec<_> = rest.iter().map(|r| r.content_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "d"]);

        assert!(log.get_page(Some(rows[3].feed_index), 10).unwrap().is_empty());
    }

    #[test]
    fn test_cached_fields_roundtrip() {
        let log = SqliteInteractionLog::in_memory().unwrap();
        let published = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
        let original = item("a").with_published_at(published).with_popularity(12);
        log.append(NewInteraction::surfaced(original.clone())).unwrap();

        let rows = log.get_by_ids(&[ContentId::new("a")]).unwrap();
        assert_eq!(rows[0].content, original);
    }

    #[test]
    fn test_tags_with_commas_roundtrip() {
        let log = SqliteInteractionLog::in_memory().unwrap();
        let original = item("a")
            .with_tag("puns, dad jokes")
            .with_tag("halloween");
        log.append(NewInteraction::surfaced(original.clone())).unwrap();

        let rows = log.get_page(None, 10).unwrap();
        assert_eq!(rows[0].content.tags, vec!["puns, dad jokes", "halloween"]);
        assert_eq!(rows[0].content, original);
    }

    #[test]
    fn test_get_by_ids_preserves_request_order() {
        let log = SqliteInteractionLog::in_memory().unwrap();
        for id in ["a", "b", "c"] {
            log.append(NewInteraction::surfaced(item(id))).unwrap();
        }
        let ids = [ContentId::new("c"), ContentId::new("missing"), ContentId::new("a")];
        let rows = log.get_by_ids(&ids).unwrap();
        let got: Vec<_> = rows.iter().map(|r| r.content_id.as_str()).collect();
        assert_eq!(got, vec!["c", "a"]);
        assert!(log.get_by_ids(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_record_updates_timestamp_only() {
        let log = SqliteInteractionLog::in_memory().unwrap();
        let row = log.append(NewInteraction::surfaced(item("a"))).unwrap();
        let at = Utc.with_ymd_and_hms(2024, 5, 5, 5, 5, 5).unwrap();

        assert!(log.record(&ContentId::new("a"), InteractionKind::Shared, at).unwrap());
        assert!(!log.record(&ContentId::new("zzz"), InteractionKind::Viewed, at).unwrap());

        let updated = &log.get_by_ids(&[ContentId::new("a")]).unwrap()[0];
        assert_eq!(updated.shared_at, Some(at));
        assert_eq!(updated.viewed_at, None);
        assert_eq!(updated.feed_index, row.feed_index);
    }

    #[test]
    fn test_unviewed_ids() {
        let log = SqliteInteractionLog::in_memory().unwrap();
        let at = Utc.with_ymd_and_hms(2024, 5, 5, 5, 5, 5).unwrap();
        log.append(NewInteraction::surfaced(item("seen")).viewed_at(at)).unwrap();
        log.append(NewInteraction::surfaced(item("surfaced"))).unwrap();

        let ids = [
            ContentId::new("new"),
            ContentId::new("seen"),
            ContentId::new("surfaced"),
        ];
        let unviewed = log.unviewed_ids(&ids).unwrap();
        assert_eq!(unviewed, vec![ContentId::new("new"), ContentId::new("surfaced")]);
    }

    #[test]
    fn test_installation_seed_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.db");

        let seed = SqliteInteractionLog::new(&path)
            .unwrap()
            .installation_seed()
            .unwrap();
        let reopened = SqliteInteractionLog::new(&path).unwrap();
        assert_eq!(reopened.installation_seed().unwrap(), seed);
        assert_eq!(reopened.db_path(), Some(path.as_path()));
    }
}
