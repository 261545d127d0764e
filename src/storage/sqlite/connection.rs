//! Shared connection handling for `SQLite` backends.

use crate::{Error, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Acquires a mutex, recovering the inner value if a previous holder panicked.
///
/// A poisoned connection mutex only means a panic happened mid-operation;
/// `SQLite` keeps the database consistent, so the connection stays usable.
pub fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("SQLite mutex was poisoned, recovering");
            metrics::counter!("sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Opens (creating if needed) a database file and applies connection pragmas.
///
/// Parent directories are created on demand.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if the directory or database cannot be opened.
pub fn open_file(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
            operation: "create_data_dir".to_string(),
            cause: format!("{}: {e}", parent.display()),
        })?;
    }

    let conn = Connection::open(path).map_err(|e| Error::OperationFailed {
        operation: "open_sqlite".to_string(),
        cause: format!("{}: {e}", path.display()),
    })?;
    configure_connection(&conn);
    Ok(conn)
}

/// Opens a private in-memory database.
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if `SQLite` cannot allocate the database.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().map_err(|e| sqlite_error("open_sqlite_in_memory", &e))?;
    configure_connection(&conn);
    Ok(conn)
}

/// Applies WAL journaling, NORMAL sync and a 5 second busy timeout.
///
/// Failures are ignored: in-memory databases reject WAL and still work.
pub fn configure_connection(conn: &Connection) {
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");
    let _ = conn.pragma_update(None, "busy_timeout", "5000");
}

/// Maps a `rusqlite` error to [`Error::OperationFailed`] with an operation label.
#[must_use]
pub fn sqlite_error(operation: &str, e: &rusqlite::Error) -> Error {
    Error::OperationFailed {
        operation: operation.to_string(),
        cause: e.to_string(),
    }
}
