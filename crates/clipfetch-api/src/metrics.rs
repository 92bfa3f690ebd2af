//! Prometheus metrics for the API server.

use std::sync::LazyLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use regex_lite::Regex;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "clipfetch_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "clipfetch_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "clipfetch_http_requests_in_flight";

    // WebSocket metrics
    pub const WS_CONNECTIONS_TOTAL: &str = "clipfetch_ws_connections_total";
    pub const WS_CONNECTIONS_ACTIVE: &str = "clipfetch_ws_connections_active";
    pub const WS_MESSAGES_SENT: &str = "clipfetch_ws_messages_sent_total";
    pub const WS_MESSAGES_RECEIVED: &str = "clipfetch_ws_messages_received_total";

    // Tool metrics
    pub const FORMAT_QUERIES_TOTAL: &str = "clipfetch_format_queries_total";
    pub const FORMAT_QUERY_DURATION_SECONDS: &str = "clipfetch_format_query_duration_seconds";
    pub const DOWNLOADS_COMPLETED_TOTAL: &str = "clipfetch_downloads_completed_total";
    pub const DOWNLOADS_FAILED_TOTAL: &str = "clipfetch_downloads_failed_total";
    pub const DOWNLOAD_DURATION_SECONDS: &str = "clipfetch_download_duration_seconds";

    // Artifact metrics
    pub const ARTIFACTS_SERVED_TOTAL: &str = "clipfetch_artifacts_served_total";
    pub const ARTIFACTS_SWEPT_TOTAL: &str = "clipfetch_artifacts_swept_total";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "clipfetch_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record WebSocket connection.
pub fn record_ws_connection(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::WS_CONNECTIONS_TOTAL, &labels).increment(1);
}

/// Update active WebSocket connections gauge.
pub fn set_ws_active_connections(count: i64) {
    gauge!(names::WS_CONNECTIONS_ACTIVE).set(count as f64);
}

/// Record WebSocket message sent.
pub fn record_ws_message_sent(endpoint: &str, message_type: &str) {
    let labels = [
        ("endpoint", endpoint.to_string()),
        ("type", message_type.to_string()),
    ];
    counter!(names::WS_MESSAGES_SENT, &labels).increment(1);
}

/// Record WebSocket message received.
pub fn record_ws_message_received(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::WS_MESSAGES_RECEIVED, &labels).increment(1);
}

/// Record a metadata query and its outcome.
pub fn record_format_query(outcome: &str, duration_secs: f64) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::FORMAT_QUERIES_TOTAL, &labels).increment(1);
    histogram!(names::FORMAT_QUERY_DURATION_SECONDS).record(duration_secs);
}

/// Record a finished download.
pub fn record_download_completed(clip: bool, duration_secs: f64) {
    let labels = [("kind", if clip { "clip" } else { "full" }.to_string())];
    counter!(names::DOWNLOADS_COMPLETED_TOTAL, &labels).increment(1);
    histogram!(names::DOWNLOAD_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a failed download.
pub fn record_download_failed(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::DOWNLOADS_FAILED_TOTAL, &labels).increment(1);
}

/// Record an artifact handed to a client.
pub fn record_artifact_served() {
    counter!(names::ARTIFACTS_SERVED_TOTAL).increment(1);
}

/// Record artifacts removed by the janitor.
pub fn record_artifacts_swept(count: usize) {
    counter!(names::ARTIFACTS_SWEPT_TOTAL).increment(count as u64);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", endpoint.to_string())];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

static ARTIFACT_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/api/artifacts/[^/]+$").expect("valid regex"));

/// Sanitize path for metrics labels (collapse artifact names).
fn sanitize_path(path: &str) -> String {
    ARTIFACT_PATH
        .replace(path, "/api/artifacts/:filename")
        .to_string()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(
            sanitize_path("/api/artifacts/550e8400-e29b-41d4-a716-446655440000.mp4"),
            "/api/artifacts/:filename"
        );
        assert_eq!(sanitize_path("/api/formats"), "/api/formats");
    }
}
