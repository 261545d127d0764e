//! Shared `SQLite` infrastructure for the interaction log and cursor store.
//!
//! - [`connection`]: opening, pragmas, poison-tolerant locking, error mapping
//! - [`metrics`]: per-operation counters and latency histograms
//! - [`interaction_row`]: row conversion for the `interactions` table
//!
//! Each backend owns its own connection; WAL mode lets the log and the cursor
//! store share one database file.

mod connection;
mod interaction_row;
mod metrics;

pub use connection::{acquire_lock, configure_connection, open_file, open_in_memory, sqlite_error};
pub use interaction_row::{INTERACTION_COLUMNS, InteractionRow, from_millis};
pub use metrics::{record_operation_metrics, timed};
