//! Composite sub-sources.
//!
//! - [`KeysetSource`]: popularity-ranked and chronological remote paging
//! - [`RandomizedSource`]: stable per-installation random order that wraps
//! - [`LocalCacheSource`]: the interaction log with remote shard fallback

mod keyset;
mod local_cache;
mod randomized;

pub use keyset::KeysetSource;
pub use local_cache::{LocalCacheCursor, LocalCacheSource};
pub use randomized::RandomizedSource;

use crate::models::SortKey;
use crate::{Error, Result};

/// Decodes a keyset cursor. Unreadable cursors restart from the origin.
fn decode_key(cursor: Option<&str>, source: &str) -> Option<SortKey> {
    let raw = cursor?;
    match serde_json::from_str(raw) {
        Ok(key) => Some(key),
        Err(e) => {
            tracing::warn!(source, error = %e, "Discarding unreadable source cursor");
            None
        },
    }
}

fn encode_key(key: &SortKey) -> Result<String> {
    serde_json::to_string(key).map_err(|e| Error::operation("encode_source_cursor", e))
}
