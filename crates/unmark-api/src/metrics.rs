//! Prometheus metrics for the API server.

use std::sync::LazyLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "unmark_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "unmark_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "unmark_http_requests_in_flight";

    // Upload metrics
    pub const UPLOADS_TOTAL: &str = "unmark_uploads_total";
    pub const UPLOAD_BYTES: &str = "unmark_upload_bytes";
    pub const UPLOADS_REJECTED_TOTAL: &str = "unmark_uploads_rejected_total";

    // Job metrics
    pub const JOBS_STARTED_TOTAL: &str = "unmark_jobs_started_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "unmark_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "unmark_jobs_failed_total";
    pub const JOBS_ACTIVE: &str = "unmark_jobs_active";

    // Processing metrics
    pub const PIPELINE_DURATION_SECONDS: &str = "unmark_pipeline_duration_seconds";
    pub const FRAMES_PROCESSED_TOTAL: &str = "unmark_frames_processed_total";
    pub const ENCODE_OUTCOMES_TOTAL: &str = "unmark_encode_outcomes_total";

    // Cleanup metrics
    pub const FILES_DELETED_TOTAL: &str = "unmark_files_deleted_total";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "unmark_rate_limit_hits_total";
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

/// Record an accepted upload.
pub fn record_upload(bytes: u64) {
    counter!(names::UPLOADS_TOTAL).increment(1);
    histogram!(names::UPLOAD_BYTES).record(bytes as f64);
}

/// Record a rejected upload.
pub fn record_upload_rejected(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::UPLOADS_REJECTED_TOTAL, &labels).increment(1);
}

/// Record a processing run starting.
pub fn record_job_started(methods: &[&str]) {
    for method in methods {
        let labels = [("method", method.to_string())];
        counter!(names::JOBS_STARTED_TOTAL, &labels).increment(1);
    }
    gauge!(names::JOBS_ACTIVE).increment(1.0);
}

/// Record a processing run that produced an output.
pub fn record_job_completed(outcome: &str, frames: u64, duration_secs: f64) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
    counter!(names::ENCODE_OUTCOMES_TOTAL, &labels).increment(1);
    counter!(names::FRAMES_PROCESSED_TOTAL).increment(frames);
    histogram!(names::PIPELINE_DURATION_SECONDS).record(duration_secs);
    gauge!(names::JOBS_ACTIVE).decrement(1.0);
}

/// Record a failed processing run.
pub fn record_job_failed() {
    counter!(names::JOBS_FAILED_TOTAL).increment(1);
    gauge!(names::JOBS_ACTIVE).decrement(1.0);
}

/// Record files removed by a cleanup endpoint.
pub fn record_files_deleted(scope: &str, count: usize) {
    let labels = [("scope", scope.to_string())];
    counter!(names::FILES_DELETED_TOTAL, &labels).increment(count as u64);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", sanitize_path(endpoint))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

static UUID_SEGMENT: LazyLock<regex_lite::Regex> = LazyLock::new(|| {
    regex_lite::Regex::new(r"[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}")
        .expect("static regex")
});

static PROCESSED_FILE: LazyLock<regex_lite::Regex> =
    LazyLock::new(|| regex_lite::Regex::new(r"^/processed/[^/]+$").expect("static regex"));

/// Sanitize path for metrics labels (job IDs and file names become placeholders).
fn sanitize_path(path: &str) -> String {
    if PROCESSED_FILE.is_match(path) {
        return "/processed/:filename".to_string();
    }
    UUID_SEGMENT.replace_all(path, ":job_id").into_owned()
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
