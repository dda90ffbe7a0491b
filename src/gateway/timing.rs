use std::sync::Arc;
use std::time::Instant;

use axum::http::{Method, StatusCode};

use gateway_metrics::{MetricsRegistry, labels};

pub const REQUESTS_TOTAL: &str = "gateway_http_requests_total";
pub const REQUEST_DURATION_SECONDS: &str = "gateway_request_duration_seconds";

/// Status recorded when the caller went away before a response was produced
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

/// Register HELP texts for the request metrics.
pub fn describe_request_metrics(metrics: &MetricsRegistry) {
    metrics.describe(REQUESTS_TOTAL, "Total number of HTTP requests");
    metrics.describe(REQUEST_DURATION_SECONDS, "HTTP request duration in seconds");
}

/// Records one request in the metrics registry exactly once.
///
/// Call [`RequestTimer::finish`] with the final status. If the timer is
/// dropped first (the handler future was cancelled), it records
/// [`CLIENT_CLOSED_REQUEST`] instead.
pub struct RequestTimer {
    metrics: Arc<MetricsRegistry>,
    method: Method,
    path: String,
    started: Instant,
    recorded: bool,
}

impl RequestTimer {
    /// `path` is the route template (e.g. `/tenant-api/*endpoint`), never
    /// the raw request path.
    pub fn start(metrics: Arc<MetricsRegistry>, method: Method, path: impl Into<String>) -> Self {
        Self {
            metrics,
            method,
            path: path.into(),
            started: Instant::now(),
            recorded: false,
        }
    }

    pub fn finish(mut self, status: StatusCode) {
        self.record(status.as_u16());
    }

    fn record(&mut self, status: u16) {
        if self.recorded {
            return;
        }
        self.recorded = true;

        let elapsed = self.started.elapsed();
        let status = status.to_string();
        let labels = labels([
            ("method", self.method.as_str()),
            ("path", self.path.as_str()),
            ("status", status.as_str()),
        ]);

        if let Err(e) = self.metrics.increment(REQUESTS_TOTAL, &labels) {
            tracing::warn!(error = %e, "Failed to record request count");
        }
        if let Err(e) = self
            .metrics
            .observe(REQUEST_DURATION_SECONDS, elapsed.as_secs_f64(), &labels)
        {
            tracing::warn!(error = %e, "Failed to record request duration");
        }

        tracing::info!(
            method = %self.method,
            path = %self.path,
            status = %status,
            elapsed_ms = elapsed.as_millis() as u64,
            "Request completed"
        );
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        self.record(CLIENT_CLOSED_REQUEST);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROUTE: &str = "/tenant-api/*endpoint";

    fn registry() -> Arc<MetricsRegistry> {
        Arc::new(MetricsRegistry::new("test").unwrap())
    }

    fn series(status: &str) -> gateway_metrics::Labels {
        labels([("method", "GET"), ("path", ROUTE), ("status", status)])
    }

    #[test]
    fn test_finish_records_once() {
        let metrics = registry();
        let timer = RequestTimer::start(metrics.clone(), Method::GET, ROUTE);
        timer.finish(StatusCode::OK);

        assert_eq!(metrics.counter_value(REQUESTS_TOTAL, &series("200")), Some(1));
        let (_, count) = metrics
            .histogram_value(REQUEST_DURATION_SECONDS, &series("200"))
            .unwrap();
        assert_eq!(count, 1);
        assert_eq!(metrics.counter_value(REQUESTS_TOTAL, &series("499")), None);
    }

    #[test]
    fn test_drop_without_finish_records_client_closed() {
        let metrics = registry();
        {
            let _timer = RequestTimer::start(metrics.clone(), Method::GET, ROUTE);
        }
        assert_eq!(metrics.counter_value(REQUESTS_TOTAL, &series("499")), Some(1));
    }

    #[test]
    fn test_duration_is_measured() {
        let metrics = registry();
        let timer = RequestTimer::start(metrics.clone(), Method::GET, ROUTE);
        std::thread::sleep(std::time::Duration::from_millis(20));
        timer.finish(StatusCode::OK);

        let (sum, _) = metrics
            .histogram_value(REQUEST_DURATION_SECONDS, &series("200"))
            .unwrap();
        assert!(sum >= 0.02, "sum was {}", sum);
        assert!(sum < 5.0);
    }
}
