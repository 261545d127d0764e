//! Circuit breaking for the remote store.
//!
//! A run of consecutive remote failures opens the breaker. After the reset
//! timeout a few trial calls are let through; one success closes it again,
//! one failure reopens it.
//!
//! While open, calls fail fast with [`Error::Unavailable`]. The paging state
//! machine treats that like any other transient failure: the previous page
//! stays on screen and the error flag is raised.

use crate::models::{ContentId, ContentItem, ContentQuery, ShardCursor, ShardPage};
use crate::storage::sqlite::acquire_lock;
use crate::storage::traits::RemoteStore;
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Circuit breaker settings for the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RemoteResilienceConfig {
    /// Consecutive failures before opening the circuit.
    pub failure_threshold: u32,
    /// How long the circuit stays open before allowing a trial call.
    pub reset_timeout_ms: u64,
    /// Trial calls allowed while half-open.
    pub half_open_max_calls: u32,
}

impl Default for RemoteResilienceConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_ms: 30_000,
            half_open_max_calls: 1,
        }
    }
}

impl RemoteResilienceConfig {
    /// Applies `FEEDWEAVE_REMOTE_BREAKER_*` environment overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_parse::<u32>("FEEDWEAVE_REMOTE_BREAKER_FAILURE_THRESHOLD") {
            self.failure_threshold = v.max(1);
        }
        if let Some(v) = env_parse::<u64>("FEEDWEAVE_REMOTE_BREAKER_RESET_MS") {
            self.reset_timeout_ms = v;
        }
        if let Some(v) = env_parse::<u32>("FEEDWEAVE_REMOTE_BREAKER_HALF_OPEN_MAX_CALLS") {
            self.half_open_max_calls = v.max(1);
        }
        self
    }

    /// Sets the failure threshold.
    #[must_use]
    pub const fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Sets the reset timeout in milliseconds.
    #[must_use]
    pub const fn with_reset_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.reset_timeout_ms = timeout_ms;
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[derive(Debug)]
enum BreakerState {
    Closed { failures: u32 },
    Open { opened_at: Instant },
    HalfOpen { attempts: u32 },
}

/// Consecutive-failure circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    state: BreakerState,
    failure_threshold: u32,
    reset_timeout: Duration,
    half_open_max_calls: u32,
    backend: &'static str,
}

impl CircuitBreaker {
    /// Creates a closed breaker.
    #[must_use]
    pub fn new(config: &RemoteResilienceConfig, backend: &'static str) -> Self {
        Self {
            state: BreakerState::Closed { failures: 0 },
            failure_threshold: config.failure_threshold.max(1),
            reset_timeout: Duration::from_millis(config.reset_timeout_ms),
            half_open_max_calls: config.half_open_max_calls.max(1),
            backend,
        }
    }

    /// Returns true if a call may proceed.
    pub fn allow(&mut self) -> bool {
        match self.state {
            BreakerState::Closed { .. } => true,
            BreakerState::Open { opened_at } => {
                if opened_at.elapsed() >= self.reset_timeout {
                    tracing::info!(backend = self.backend, "Circuit breaker half-open");
                    self.state = BreakerState::HalfOpen { attempts: 1 };
                    true
                } else {
                    false
                }
            },
            BreakerState::HalfOpen { ref mut attempts } => {
                if *attempts >= self.half_open_max_calls {
                    false
                } else {
                    *attempts += 1;
                    true
                }
            },
        }
    }

    /// Records a success and closes the circuit.
    pub fn on_success(&mut self) {
        if !matches!(self.state, BreakerState::Closed { failures: 0 }) {
            tracing::info!(backend = self.backend, "Circuit breaker closed");
        }
        self.state = BreakerState::Closed { failures: 0 };
    }

    /// Records a failure. Returns true if the circuit just opened.
    pub fn on_failure(&mut self) -> bool {
        match self.state {
            BreakerState::Closed { ref mut failures } => {
                *failures += 1;
                if *failures >= self.failure_threshold {
                    tracing::warn!(
                        backend = self.backend,
                        failures = *failures,
                        "Circuit breaker opened"
                    );
                    self.state = BreakerState::Open {
                        opened_at: Instant::now(),
                    };
                    return true;
                }
            },
            BreakerState::HalfOpen { .. } => {
                tracing::warn!(backend = self.backend, "Circuit breaker re-opened");
                self.state = BreakerState::Open {
                    opened_at: Instant::now(),
                };
                return true;
            },
            BreakerState::Open { .. } => {},
        }
        false
    }

    /// 0 closed, 1 open, 2 half-open.
    #[must_use]
    pub const fn state_value(&self) -> u8 {
        match self.state {
            BreakerState::Closed { .. } => 0,
            BreakerState::Open { .. } => 1,
            BreakerState::HalfOpen { .. } => 2,
        }
    }
}

/// Remote store wrapper that fails fast while the remote is unhealthy.
pub struct ResilientRemoteStore<R: RemoteStore> {
    inner: R,
    breaker: Mutex<CircuitBreaker>,
    backend: &'static str,
}

impl<R: RemoteStore> ResilientRemoteStore<R> {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: R, config: &RemoteResilienceConfig, backend: &'static str) -> Self {
        Self {
            inner,
            breaker: Mutex::new(CircuitBreaker::new(config, backend)),
            backend,
        }
    }

    /// Returns the wrapped store.
    pub const fn inner(&self) -> &R {
        &self.inner
    }

    async fn execute<T, F>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send,
    {
        let allowed = acquire_lock(&self.breaker).allow();
        if !allowed {
            self.record(operation, "circuit_open");
            return Err(Error::Unavailable {
                backend: self.backend.to_string(),
            });
        }

        let result = call.await;

        let tripped = {
            let mut breaker = acquire_lock(&self.breaker);
            if result.is_ok() {
                breaker.on_success();
                false
            } else {
                breaker.on_failure()
            }
        };
        self.record(operation, if result.is_ok() { "success" } else { "error" });
        if tripped {
            metrics::counter!(
                "remote_circuit_breaker_trips_total",
                "backend" => self.backend,
                "operation" => operation
            )
            .increment(1);
        }
        result
    }

    fn record(&self, operation: &'static str, status: &'static str) {
        let state = acquire_lock(&self.breaker).state_value();
        metrics::counter!(
            "remote_requests_total",
            "backend" => self.backend,
            "operation" => operation,
            "status" => status
        )
        .increment(1);
        metrics::gauge!("remote_circuit_breaker_state", "backend" => self.backend)
            .set(f64::from(state));
    }
}

#[async_trait]
impl<R: RemoteStore> RemoteStore for ResilientRemoteStore<R> {
    async fn get_sharded_page(&self, after: Option<&ShardCursor>) -> Result<ShardPage> {
        self.execute("get_sharded_page", self.inner.get_sharded_page(after))
            .await
    }

    async fn get_by_ids(&self, ids: &[ContentId]) -> Result<Vec<ContentItem>> {
        self.execute("get_by_ids", self.inner.get_by_ids(ids)).await
    }

    async fn query(&self, query: &ContentQuery) -> Result<Vec<ContentItem>> {
        self.execute("query", self.inner.query(query)).await
    }

    async fn featured_for(&self, day: NaiveDate) -> Result<Option<ContentItem>> {
        self.execute("featured_for", self.inner.featured_for(day))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::remote::MemoryRemoteStore;

    fn config(threshold: u32, reset_ms: u64) -> RemoteResilienceConfig {
        RemoteResilienceConfig::default()
            .with_failure_threshold(threshold)
            .with_reset_timeout_ms(reset_ms)
    }

    #[test]
    fn test_breaker_opens_after_threshold() {
        let mut breaker = CircuitBreaker::new(&config(2, 60_000), "remote");
        assert!(!breaker.on_failure());
        assert!(breaker.on_failure());
        assert_eq!(breaker.state_value(), 1);
        assert!(!breaker.allow());
    }

    #[test]
    fn test_breaker_half_open_then_closes() {
        let mut breaker = CircuitBreaker::new(&config(1, 0), "remote");
        assert!(breaker.on_failure());
        assert!(breaker.allow());
        assert_eq!(breaker.state_value(), 2);
        assert!(!breaker.allow());
        breaker.on_success();
        assert_eq!(breaker.state_value(), 0);
    }

    #[test]
    fn test_breaker_reopens_on_half_open_failure() {
        let mut breaker = CircuitBreaker::new(&config(1, 0), "remote");
        breaker.on_failure();
        assert!(breaker.allow());
        assert!(breaker.on_failure());
        assert_eq!(breaker.state_value(), 1);
    }

    #[tokio::test]
    async fn test_resilient_store_fails_fast_when_open() {
        let inner = MemoryRemoteStore::new(10);
        inner.fail_next(2);
        let store = ResilientRemoteStore::new(inner, &config(2, 60_000), "remote");

        assert!(matches!(
            store.get_sharded_page(None).await,
            Err(Error::OperationFailed { .. })
        ));
        assert!(store.get_sharded_page(None).await.is_err());
        assert!(matches!(
            store.get_sharded_page(None).await,
            Err(Error::Unavailable { .. })
        ));
        assert_eq!(store.inner().call_count(), 2);
    }
}
