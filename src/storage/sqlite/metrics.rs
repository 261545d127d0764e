//! Operation metrics for storage backends.

use std::time::Instant;

/// Runs a storage operation and records its outcome and latency.
///
/// Emits `storage_operations_total` and `storage_operation_duration_ms`, both
/// labelled with backend, operation and `success`/`error` status.
pub fn timed<T, E>(
    backend: &'static str,
    operation: &'static str,
    f: impl FnOnce() -> Result<T, E>,
) -> Result<T, E> {
    let start = Instant::now();
    let result = f();
    let status = if result.is_ok() { "success" } else { "error" };
    record_operation_metrics(backend, operation, start, status);
    result
}

/// Records a counter and a latency histogram for one storage operation.
pub fn record_operation_metrics(
    backend: &'static str,
    operation: &'static str,
    start: Instant,
    status: &'static str,
) {
    metrics::counter!(
        "storage_operations_total",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "storage_operation_duration_ms",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}
