//! Configuration management.
//!
//! [`FeedConfig`] is built from defaults, then an optional TOML file, then
//! `FEEDWEAVE_*` environment overrides.
//!
//! ```toml
//! page_size = 20
//! filter_viewed = true
//!
//! [[boundaries]]
//! source = "popular"
//! min_index = 0
//! max_index = 29
//!
//! [[seasons]]
//! id = "halloween"
//! tag = "halloween"
//! start = "10-01"
//! end = "10-31"
//!
//! [remote_breaker]
//! failure_threshold = 5
//! reset_timeout_ms = 30000
//! ```

use crate::services::boundary::{BoundaryEntry, BoundaryTable, default_entries};
use crate::services::priority::SeasonWindow;
use crate::storage::RemoteResilienceConfig;
use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Database file name inside the data directory.
pub const DATABASE_FILE: &str = "feedweave.db";

/// Feed engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    /// Items requested per page.
    pub page_size: usize,
    /// Directory holding the `SQLite` database.
    pub data_dir: PathBuf,
    /// Whether the viewed filter runs.
    pub filter_viewed: bool,
    /// Automatic continuations when a page filters down to nothing.
    pub max_empty_continuations: usize,
    /// Whether the featured-of-the-day source is consulted.
    pub featured_enabled: bool,
    /// Composite source eligibility, in interleave order.
    pub boundaries: Vec<BoundaryEntry>,
    /// Seasonal promotion windows, first match wins.
    pub seasons: Vec<SeasonWindow>,
    /// Remote store circuit breaker.
    pub remote_breaker: RemoteResilienceConfig,
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Page size.
    pub page_size: Option<usize>,
    /// Data directory.
    pub data_dir: Option<String>,
    /// Viewed filter.
    pub filter_viewed: Option<bool>,
    /// Empty continuation bound.
    pub max_empty_continuations: Option<usize>,
    /// Featured source toggle.
    pub featured_enabled: Option<bool>,
    /// Boundary table override.
    pub boundaries: Option<Vec<BoundaryEntry>>,
    /// Season windows.
    pub seasons: Option<Vec<SeasonWindow>>,
    /// Circuit breaker settings.
    pub remote_breaker: Option<RemoteResilienceConfig>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            data_dir: default_data_dir(),
            filter_viewed: false,
            max_empty_continuations: crate::paging::DEFAULT_MAX_EMPTY_CONTINUATIONS,
            featured_enabled: true,
            boundaries: default_entries(),
            seasons: Vec::new(),
            remote_breaker: RemoteResilienceConfig::default(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "feedweave")
        .map_or_else(|| PathBuf::from(".feedweave"), |dirs| dirs.data_dir().to_path_buf())
}

impl FeedConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::operation("read_config_file", e))?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid configuration.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| Error::operation("parse_config_file", e))?;
        Ok(Self::from_config_file(file))
    }

    /// Default configuration file location.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::BaseDirs::new()
            .map(|dirs| dirs.config_dir().join("feedweave").join("config.toml"))
    }

    /// Loads configuration from the default location, then applies
    /// environment overrides.
    ///
    /// A missing or unreadable file yields the defaults.
    #[must_use]
    pub fn load_default() -> Self {
        let from_file = Self::default_path()
            .filter(|path| path.exists())
            .and_then(|path| match Self::load_from_file(&path) {
                Ok(config) => Some(config),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring config file");
                    None
                },
            });
        from_file.unwrap_or_default().with_env_overrides()
    }

    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(page_size) = file.page_size {
            config.page_size = page_size;
        }
        if let Some(data_dir) = file.data_dir {
            config.data_dir = PathBuf::from(data_dir);
        }
        if let Some(v) = file.filter_viewed {
            config.filter_viewed = v;
        }
        if let Some(v) = file.max_empty_continuations {
            config.max_empty_continuations = v;
        }
        if let Some(v) = file.featured_enabled {
            config.featured_enabled = v;
        }
        if let Some(boundaries) = file.boundaries {
            config.boundaries = boundaries;
        }
        if let Some(seasons) = file.seasons {
            config.seasons = seasons;
        }
        if let Some(breaker) = file.remote_breaker {
            config.remote_breaker = breaker;
        }

        config
    }

    /// Applies `FEEDWEAVE_*` environment overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_parse::<usize>("FEEDWEAVE_PAGE_SIZE") {
            self.page_size = v;
        }
        if let Ok(v) = std::env::var("FEEDWEAVE_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Some(v) = env_bool("FEEDWEAVE_FILTER_VIEWED") {
            self.filter_viewed = v;
        }
        if let Some(v) = env_bool("FEEDWEAVE_FEATURED_ENABLED") {
            self.featured_enabled = v;
        }
        self.remote_breaker = self.remote_breaker.with_env_overrides();
        self
    }

    /// Validates the configuration and builds the boundary table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a zero page size or an invalid
    /// boundary table.
    pub fn boundary_table(&self) -> Result<BoundaryTable> {
        if self.page_size == 0 {
            return Err(Error::InvalidInput("page_size must be positive".to_string()));
        }
        BoundaryTable::new(self.boundaries.clone())
    }

    /// Path of the `SQLite` database.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }

    /// Sets the page size.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = path.into();
        self
    }

    /// Enables or disables the viewed filter.
    #[must_use]
    pub const fn with_filter_viewed(mut self, enabled: bool) -> Self {
        self.filter_viewed = enabled;
        self
    }

    /// Enables or disables the featured-of-the-day source.
    #[must_use]
    pub const fn with_featured(mut self, enabled: bool) -> Self {
        self.featured_enabled = enabled;
        self
    }

    /// Replaces the boundary table.
    #[must_use]
    pub fn with_boundaries(mut self, boundaries: Vec<BoundaryEntry>) -> Self {
        self.boundaries = boundaries;
        self
    }

    /// Adds a season window.
    #[must_use]
    pub fn with_season(mut self, season: SeasonWindow) -> Self {
        self.seasons.push(season);
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceId;

    #[test]
    fn test_defaults() {
        let config = FeedConfig::default();
        assert_eq!(config.page_size, 20);
        assert!(!config.filter_viewed);
        assert_eq!(config.boundaries.len(), 4);
        assert!(config.boundary_table().is_ok());
        assert!(config.database_path().ends_with(DATABASE_FILE));
    }

    #[test]
    fn test_from_toml() {
        let config = FeedConfig::from_toml(
            r#"
            page_size = 10
            filter_viewed = true

            [[boundaries]]
            source = "local_cache"
            min_index = 0

            [[seasons]]
            id = "winter"
            tag = "holiday"
            start = "12-20"
            end = "01-05"

            [remote_breaker]
            failure_threshold = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.page_size, 10);
        assert!(config.filter_viewed);
        assert_eq!(config.boundaries.len(), 1);
        assert_eq!(config.boundaries[0].source, SourceId::LocalCache);
        assert_eq!(config.boundaries[0].max_index, None);
        assert_eq!(config.seasons[0].start.to_string(), "12-20");
        assert_eq!(config.remote_breaker.failure_threshold, 2);
        assert_eq!(config.remote_breaker.reset_timeout_ms, 30_000);
    }

    #[test]
    fn test_invalid_season_date_rejected() {
        let result = FeedConfig::from_toml(
            r#"
            [[seasons]]
            id = "bad"
            tag = "bad"
            start = "13-01"
            end = "01-05"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_page_size_rejected() {
        assert!(FeedConfig::default().with_page_size(0).boundary_table().is_err());
    }
}
