//! Composite cursor codec.
//!
//! Wire format: versioned JSON wrapped in URL-safe, unpadded base64. Maps are
//! ordered, so equal cursors always encode to equal strings.

use crate::models::CompositeCursor;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};

const CODEC_VERSION: u32 = 1;

#[derive(Serialize)]
struct WireRef<'a> {
    v: u32,
    #[serde(flatten)]
    cursor: &'a CompositeCursor,
}

#[derive(Deserialize)]
struct WireOwned {
    v: u32,
    #[serde(flatten)]
    cursor: CompositeCursor,
}

/// Serializes and deserializes [`CompositeCursor`] values.
#[derive(Debug, Clone, Copy, Default)]
pub struct CursorCodec;

impl CursorCodec {
    /// Encodes a cursor into an opaque token.
    #[must_use]
    pub fn encode(cursor: &CompositeCursor) -> String {
        let wire = WireRef {
            v: CODEC_VERSION,
            cursor,
        };
        // Serializing plain maps of strings and integers cannot fail.
        let json = serde_json::to_vec(&wire).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Decodes a token.
    ///
    /// Returns `None` for missing, malformed, or unknown-version tokens; the
    /// caller starts a fresh feed in that case.
    #[must_use]
    pub fn decode(token: Option<&str>) -> Option<CompositeCursor> {
        let token = token?.trim();
        if token.is_empty() {
            return None;
        }

        let bytes = match URL_SAFE_NO_PAD.decode(token) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::debug!(error = %e, "Discarding cursor with invalid base64");
                return None;
            },
        };

        match serde_json::from_slice::<WireOwned>(&bytes) {
            Ok(wire) if wire.v == CODEC_VERSION => Some(wire.cursor),
            Ok(wire) => {
                tracing::debug!(version = wire.v, "Discarding cursor with unknown version");
                None
            },
            Err(e) => {
                tracing::debug!(error = %e, "Discarding cursor with invalid payload");
                None
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PriorityState, SourceId};

    fn sample() -> CompositeCursor {
        let mut cursor = CompositeCursor::new();
        cursor.total_items_loaded = 45;
        cursor.merge_sub_cursor(SourceId::LocalCache, Some("{\"remote\":\"shard-1\"}".to_string()));
        cursor.merge_sub_cursor(SourceId::Popular, Some("p-9".to_string()));
        cursor.set_priority_state(
            SourceId::Seasonal,
            PriorityState::Done {
                epoch: "halloween-2024".to_string(),
            },
        );
        cursor.set_priority_state(
            SourceId::Featured,
            PriorityState::Suspended {
                cursor: "2024-10-31".to_string(),
            },
        );
        cursor
    }

    #[test]
    fn test_roundtrip() {
        let cursor = sample();
        let token = CursorCodec::encode(&cursor);
        assert_eq!(CursorCodec::decode(Some(&token)), Some(cursor));
    }

    #[test]
    fn test_roundtrip_empty() {
        let cursor = CompositeCursor::new();
        let token = CursorCodec::encode(&cursor);
        assert_eq!(CursorCodec::decode(Some(&token)), Some(cursor));
    }

    #[test]
    fn test_encoding_is_deterministic() {
        assert_eq!(CursorCodec::encode(&sample()), CursorCodec::encode(&sample()));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert_eq!(CursorCodec::decode(None), None);
        assert_eq!(CursorCodec::decode(Some("")), None);
        assert_eq!(CursorCodec::decode(Some("!!not base64!!")), None);
        let not_json = URL_SAFE_NO_PAD.encode(b"hello");
        assert_eq!(CursorCodec::decode(Some(&not_json)), None);
    }

    #[test]
    fn test_decode_rejects_unknown_version() {
        let token = URL_SAFE_NO_PAD.encode(br#"{"v":99,"total_items_loaded":1}"#);
        assert_eq!(CursorCodec::decode(Some(&token)), None);
    }

    #[test]
    fn test_decode_rejects_unknown_source() {
        let token = URL_SAFE_NO_PAD
            .encode(br#"{"v":1,"total_items_loaded":1,"sub_source_cursors":{"bogus":"x"}}"#);
        assert_eq!(CursorCodec::decode(Some(&token)), None);
    }
}
