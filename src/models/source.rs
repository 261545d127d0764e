//! Source identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a feed source.
///
/// The first four are composite sources mixed by the multiplexer; the last two
/// are priority sources consulted before the mix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceId {
    /// On-device interaction log with remote shard fallback.
    LocalCache,
    /// Popularity-ranked remote content.
    Popular,
    /// Remote content in a stable per-installation random order.
    Randomized,
    /// Remote content in publish order.
    Chronological,
    /// Seasonal promotion inserts.
    Seasonal,
    /// The featured item of the day.
    Featured,
}

impl SourceId {
    /// Returns all source variants.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::LocalCache,
            Self::Popular,
            Self::Randomized,
            Self::Chronological,
            Self::Seasonal,
            Self::Featured,
        ]
    }

    /// Returns the source as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::LocalCache => "local_cache",
            Self::Popular => "popular",
            Self::Randomized => "randomized",
            Self::Chronological => "chronological",
            Self::Seasonal => "seasonal",
            Self::Featured => "featured",
        }
    }

    /// Parses a source from a string (case-insensitive, `-` or `_` separators).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "local_cache" | "local" => Some(Self::LocalCache),
            "popular" | "popularity" => Some(Self::Popular),
            "randomized" | "random" => Some(Self::Randomized),
            "chronological" | "latest" => Some(Self::Chronological),
            "seasonal" => Some(Self::Seasonal),
            "featured" | "joke_of_the_day" => Some(Self::Featured),
            _ => None,
        }
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
