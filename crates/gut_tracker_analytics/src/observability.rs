//! Request metrics and timing for facade operations.
//!
//! Everything goes through the `metrics` facade, so recording is free until
//! the embedding process installs a recorder (for example a Prometheus
//! exporter).

use std::future::Future;
use std::time::{Duration, Instant};

use tracing::{debug, error};

use crate::error::AnalyticsResult;

pub const REQUESTS_TOTAL: &str = "gut_analytics_requests_total";
pub const DURATION_SECONDS: &str = "gut_analytics_duration_seconds";

pub fn record_request(operation: &'static str, outcome: &'static str, elapsed: Duration) {
    metrics::counter!(REQUESTS_TOTAL, "operation" => operation, "outcome" => outcome).increment(1);
    metrics::histogram!(DURATION_SECONDS, "operation" => operation).record(elapsed.as_secs_f64());
}

/// Run one facade operation, logging and recording its outcome.
pub async fn observe<T, Fut>(operation: &'static str, fut: Fut) -> AnalyticsResult<T>
where
    Fut: Future<Output = AnalyticsResult<T>>,
{
    let start = Instant::now();
    debug!(operation, "starting analysis");

    let result = fut.await;

    let elapsed = start.elapsed();
    let outcome = match &result {
        Ok(_) => {
            debug!(operation, ?elapsed, "analysis completed");
            "ok"
        }
        Err(e) => {
            error!(operation, ?elapsed, error = %e, "analysis failed");
            e.kind()
        }
    };
    record_request(operation, outcome, elapsed);
    result
}
