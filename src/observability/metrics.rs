//! Prometheus metrics for monitoring application performance.
//!
//! Tracks key business and technical metrics including:
//! - Request rates and latencies
//! - Per-extractor success/failure rates
//! - Offers found per comparison
//! - Exchange rate API usage

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Instant;

/// Initializes all metric descriptions for Prometheus.
///
/// Call this once at application startup to register metric metadata.
pub fn init_metrics() {
    // HTTP Request Metrics
    describe_counter!(
        "http_requests_total",
        "Total number of HTTP requests received"
    );
    describe_histogram!("http_request_duration_seconds", "HTTP request duration");
    describe_counter!(
        "http_requests_errors_total",
        "Total number of HTTP request errors"
    );

    // Comparison Metrics
    describe_counter!(
        "comparisons_total",
        "Total number of comparison requests served"
    );
    describe_histogram!(
        "comparison_duration_seconds",
        "Time taken to complete a comparison fan-out"
    );
    describe_histogram!(
        "offers_per_comparison",
        "Number of offers returned per comparison"
    );

    // Extractor Metrics
    describe_counter!(
        "extractor_requests_total",
        "Total extractor invocations by site"
    );
    describe_counter!(
        "extractor_requests_success",
        "Extractor invocations that returned offers or an empty list"
    );
    describe_counter!(
        "extractor_requests_failures",
        "Extractor invocations that failed, were blocked, or timed out"
    );
    describe_histogram!(
        "extractor_duration_seconds",
        "Time taken per extractor invocation"
    );

    // Exchange Rate Metrics
    describe_counter!(
        "exchange_rate_api_calls_total",
        "Total calls to the exchange rate provider"
    );

    // Business Metrics
    describe_gauge!("active_comparisons", "Number of in-flight comparisons");
}

/// Records an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration: std::time::Duration) {
    counter!("http_requests_total", "method" => method.to_string(), "path" => path.to_string(), "status" => status.to_string()).increment(1);
    histogram!("http_request_duration_seconds", "method" => method.to_string(), "path" => path.to_string())
        .record(duration.as_secs_f64());

    if status >= 400 {
        counter!("http_requests_errors_total", "method" => method.to_string(), "path" => path.to_string(), "status" => status.to_string()).increment(1);
    }
}

/// Records one completed comparison fan-out.
pub fn record_comparison(offers: usize, duration: std::time::Duration) {
    counter!("comparisons_total").increment(1);
    histogram!("comparison_duration_seconds").record(duration.as_secs_f64());
    histogram!("offers_per_comparison").record(offers as f64);
}

/// Records one extractor invocation.
pub fn record_extractor_request(site: &str, success: bool, duration: std::time::Duration) {
    counter!("extractor_requests_total", "site" => site.to_string()).increment(1);

    if success {
        counter!("extractor_requests_success", "site" => site.to_string()).increment(1);
    } else {
        counter!("extractor_requests_failures", "site" => site.to_string()).increment(1);
    }

    histogram!("extractor_duration_seconds", "site" => site.to_string())
        .record(duration.as_secs_f64());
}

/// Records an exchange rate provider call.
pub fn record_rate_api_call() {
    counter!("exchange_rate_api_calls_total").increment(1);
}

/// Helper to track in-flight comparisons.
pub struct ComparisonTracker {
    _start: Instant,
}

impl ComparisonTracker {
    pub fn new() -> Self {
        gauge!("active_comparisons").increment(1.0);
        Self {
            _start: Instant::now(),
        }
    }
}

impl Default for ComparisonTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ComparisonTracker {
    fn drop(&mut self) {
        gauge!("active_comparisons").decrement(1.0);
    }
}
