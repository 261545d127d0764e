//! Structured logging configuration.

use std::path::PathBuf;

const DEFAULT_FILTER: &str = "feedweave=info";
const VERBOSE_FILTER: &str = "feedweave=debug";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// `EnvFilter` directives.
    pub filter: String,
    /// Optional file to append to instead of stderr.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: DEFAULT_FILTER.to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Builds logging configuration from the environment.
    ///
    /// `RUST_LOG` wins over the `verbose` flag; `FEEDWEAVE_LOG_FORMAT` and
    /// `FEEDWEAVE_LOG_FILE` select format and destination.
    #[must_use]
    pub fn from_env(verbose: bool) -> Self {
        Self::from_lookup(verbose, |key| std::env::var(key).ok())
    }

    fn from_lookup(verbose: bool, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let filter = lookup("RUST_LOG")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| {
                if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER }.to_string()
            });
        let format = lookup("FEEDWEAVE_LOG_FORMAT")
            .and_then(|v| LogFormat::parse(&v))
            .unwrap_or_default();
        let file = lookup("FEEDWEAVE_LOG_FILE")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        Self {
            format,
            filter,
            file,
        }
    }
}
