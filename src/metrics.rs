/// Metrics and telemetry for PantryIQ
///
/// Provides Prometheus-compatible metrics for monitoring:
/// - HTTP request counts and latencies
/// - Signups, family invites and invite acceptances
/// - Email outbox deliveries
/// - Insight provider fallbacks
/// - Background job execution

use lazy_static::lazy_static;
use prometheus::{
    register_gauge, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, Encoder, Gauge, HistogramVec, IntCounter, IntCounterVec, IntGauge,
    TextEncoder,
};

lazy_static! {
    // ========== HTTP Metrics ==========

    /// Total HTTP requests by method, path, and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request latencies in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    /// Active HTTP requests
    pub static ref HTTP_REQUESTS_ACTIVE: IntGauge = register_int_gauge!(
        "http_requests_active",
        "Number of HTTP requests currently being processed"
    )
    .unwrap();

    // ========== Account Metrics ==========

    /// Accounts created through signup
    pub static ref SIGNUPS_TOTAL: IntCounter = register_int_counter!(
        "pantry_signups_total",
        "Total number of accounts created"
    )
    .unwrap();

    /// Family invitations sent
    pub static ref FAMILY_INVITES_TOTAL: IntCounter = register_int_counter!(
        "pantry_family_invites_total",
        "Total number of family invitations created"
    )
    .unwrap();

    /// Family invitations accepted
    pub static ref FAMILY_INVITES_ACCEPTED_TOTAL: IntCounter = register_int_counter!(
        "pantry_family_invites_accepted_total",
        "Total number of family invitations accepted"
    )
    .unwrap();

    // ========== Email Metrics ==========

    /// Outbox delivery attempts by email kind and outcome
    pub static ref EMAIL_DELIVERIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "pantry_email_deliveries_total",
        "Total number of outbox delivery attempts",
        &["kind", "outcome"]
    )
    .unwrap();

    // ========== Insight Metrics ==========

    /// Static suggestions served instead of provider output
    pub static ref INSIGHT_FALLBACKS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "pantry_insight_fallbacks_total",
        "Total number of insight requests answered with static suggestions",
        &["reason"]
    )
    .unwrap();

    // ========== Background Job Metrics ==========

    /// Background job executions by job type and status
    pub static ref BACKGROUND_JOBS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "background_jobs_total",
        "Total number of background job executions",
        &["job_type", "status"]
    )
    .unwrap();

    /// Background job duration in seconds
    pub static ref BACKGROUND_JOB_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "background_job_duration_seconds",
        "Background job execution time in seconds",
        &["job_type"],
        vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0]
    )
    .unwrap();

    // ========== Error Metrics ==========

    /// Errors returned to clients, by error code
    pub static ref ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "errors_total",
        "Total number of errors",
        &["error_type"]
    )
    .unwrap();

    // ========== System Metrics ==========

    /// Application uptime in seconds
    pub static ref UPTIME_SECONDS: Gauge = register_gauge!(
        "uptime_seconds",
        "Application uptime in seconds"
    )
    .unwrap();
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration);
}

/// Record a signup
pub fn record_signup() {
    SIGNUPS_TOTAL.inc();
}

/// Record a family invitation
pub fn record_invite() {
    FAMILY_INVITES_TOTAL.inc();
}

/// Record an accepted family invitation
pub fn record_invite_accepted() {
    FAMILY_INVITES_ACCEPTED_TOTAL.inc();
}

/// Record an outbox delivery attempt (`delivered`, `retry` or `abandoned`)
pub fn record_email_delivery(kind: &str, outcome: &str) {
    EMAIL_DELIVERIES_TOTAL
        .with_label_values(&[kind, outcome])
        .inc();
}

/// Record an insight fallback
pub fn record_insight_fallback(reason: &str) {
    INSIGHT_FALLBACKS_TOTAL.with_label_values(&[reason]).inc();
}

/// Record a background job execution
pub fn record_background_job(job_type: &str, status: &str, duration: f64) {
    BACKGROUND_JOBS_TOTAL
        .with_label_values(&[job_type, status])
        .inc();
    BACKGROUND_JOB_DURATION_SECONDS
        .with_label_values(&[job_type])
        .observe(duration);
}

/// Record an error
pub fn record_error(error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[error_type]).inc();
}
