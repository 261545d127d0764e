//! Observability: structured logging and Prometheus metrics.
//!
//! Library code only emits `tracing` events and `metrics` counters; binaries
//! call [`init_from_env`] once to install a subscriber and a recorder.

mod logging;
mod metrics;

pub use logging::{LogFormat, LoggingConfig};
pub use metrics::{MetricsConfig, MetricsHandle, install_prometheus};

use crate::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::{self, writer::BoxMakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Full observability configuration.
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Logging configuration.
    pub logging: LoggingConfig,
    /// Metrics configuration.
    pub metrics: MetricsConfig,
    /// Whether to expose metrics via HTTP listener.
    pub metrics_expose: bool,
}

/// Options for environment-based initialization.
#[derive(Debug, Clone, Copy, Default)]
pub struct InitOptions {
    /// Whether verbose output was requested via CLI.
    pub verbose: bool,
    /// Whether to expose metrics via HTTP listener.
    pub metrics_expose: bool,
}

/// Handle for observability runtime components.
#[derive(Debug)]
pub struct ObservabilityHandle {
    metrics: Option<MetricsHandle>,
}

impl ObservabilityHandle {
    /// The metrics handle, if metrics are enabled.
    #[must_use]
    pub const fn metrics(&self) -> Option<&MetricsHandle> {
        self.metrics.as_ref()
    }
}

static OBSERVABILITY_INIT: OnceLock<()> = OnceLock::new();

/// Initializes observability using environment variables.
///
/// # Errors
///
/// Returns an error if observability has already been initialized or if any
/// component fails to initialize.
pub fn init_from_env(options: InitOptions) -> Result<ObservabilityHandle> {
    init(ObservabilityConfig {
        logging: LoggingConfig::from_env(options.verbose),
        metrics: MetricsConfig::from_env(),
        metrics_expose: options.metrics_expose,
    })
}

/// Initializes logging and metrics for the process.
///
/// # Errors
///
/// Returns an error if observability has already been initialized or if any
/// component fails to initialize.
pub fn init(config: ObservabilityConfig) -> Result<ObservabilityHandle> {
    if OBSERVABILITY_INIT.get().is_some() {
        return Err(Error::operation(
            "observability_init",
            "observability already initialized",
        ));
    }

    let metrics = install_prometheus(&config.metrics, config.metrics_expose)?;
    let filter = EnvFilter::try_new(&config.logging.filter)
        .map_err(|e| Error::InvalidInput(format!("log filter: {e}")))?;

    let to_terminal = config.logging.file.is_none();
    let writer = match &config.logging.file {
        Some(path) => BoxMakeWriter::new(open_log_file(path)?),
        None => BoxMakeWriter::new(io::stderr),
    };
    let (json_layer, text_layer) = match config.logging.format {
        LogFormat::Json => (
            Some(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(writer),
            ),
            None,
        ),
        LogFormat::Pretty => (
            None,
            Some(fmt::layer().with_ansi(to_terminal).with_writer(writer)),
        ),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .map_err(|e| Error::operation("observability_init", e))?;

    OBSERVABILITY_INIT
        .set(())
        .map_err(|()| Error::operation("observability_init", "failed to mark initialized"))?;
    tracing::debug!(format = ?config.logging.format, to_terminal, "Observability initialized");

    Ok(ObservabilityHandle { metrics })
}

/// Opens `path` for appending, creating parent directories.
fn open_log_file(path: &Path) -> Result<Arc<File>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::operation("create_log_dir", e))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map(Arc::new)
        .map_err(|e| Error::operation("open_log_file", format!("{}: {e}", path.display())))
}
