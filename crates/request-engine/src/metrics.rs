//! Engine counters
//!
//! - `engine_requests_total` (counter): labels `method`, `outcome`
//! - `engine_rate_limit_retries_total` (counter)
//!
//! Exposition is left to the host application; without an installed
//! recorder these are no-ops.

/// Record a finished logical call. `outcome` is `success` or an
/// `ErrorKind` label.
pub fn record_request(method: &str, outcome: &str) {
    metrics::counter!(
        "engine_requests_total",
        "method" => method.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record one re-attempt after a 429.
pub fn record_rate_limit_retry() {
    metrics::counter!("engine_rate_limit_retries_total").increment(1);
}
