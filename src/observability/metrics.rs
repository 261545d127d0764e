//! Prometheus metrics.

use crate::{Error, Result};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

const DEFAULT_PORT: u16 = 9090;

/// Metrics configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsConfig {
    /// Whether metrics are recorded at all.
    pub enabled: bool,
    /// Address of the scrape endpoint.
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
        }
    }
}

impl MetricsConfig {
    /// Builds metrics configuration from `FEEDWEAVE_METRICS_*` variables.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(enabled) = parse_bool_env("FEEDWEAVE_METRICS_ENABLED") {
            config.enabled = enabled;
        }
        if let Some(port) = parse_port_env("FEEDWEAVE_METRICS_PORT") {
            config.listen_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port);
        }
        config
    }
}

/// Handle to the installed recorder.
#[derive(Debug, Clone)]
pub struct MetricsHandle {
    prometheus: PrometheusHandle,
}

impl MetricsHandle {
    /// Renders the current metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> String {
        self.prometheus.render()
    }
}

/// Installs the Prometheus recorder, plus an HTTP scrape listener when
/// `expose` is set.
///
/// Returns `None` when metrics are disabled. The listener runs on the
/// current Tokio runtime.
///
/// # Errors
///
/// Returns an error if a global recorder is already installed, or if
/// `expose` is set outside a Tokio runtime or the listener cannot bind.
pub fn install_prometheus(config: &MetricsConfig, expose: bool) -> Result<Option<MetricsHandle>> {
    if !config.enabled {
        return Ok(None);
    }

    let prometheus = if expose {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::operation("metrics_exporter_runtime", e))?;
        let (recorder, exporter) = {
            let _guard = runtime.enter();
            PrometheusBuilder::new()
                .with_http_listener(config.listen_addr)
                .build()
                .map_err(|e| Error::operation("metrics_exporter_build", e))?
        };
        let handle = recorder.handle();
        set_global_recorder(recorder)?;
        runtime.spawn(exporter);
        handle
    } else {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        set_global_recorder(recorder)?;
        handle
    };

    tracing::debug!(expose, addr = %config.listen_addr, "Metrics recorder installed");
    Ok(Some(MetricsHandle { prometheus }))
}

fn set_global_recorder(recorder: PrometheusRecorder) -> Result<()> {
    metrics::set_global_recorder(recorder).map_err(|e| Error::operation("metrics_recorder_install", e))
}

fn parse_bool_env(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|value| matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on"))
}

fn parse_port_env(key: &str) -> Option<u16> {
    std::env::var(key).ok().and_then(|value| value.trim().parse().ok())
}
