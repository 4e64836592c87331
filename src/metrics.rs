use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::time::Duration;

/// Initialize Prometheus metrics exporter
pub fn init_metrics() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    init_metric_descriptions();

    Ok(handle)
}

/// Initialize metric descriptions (can be called multiple times safely)
fn init_metric_descriptions() {
    describe_counter!(
        "buildlogger_requests_total",
        "Total number of buildlogger requests"
    );
    describe_histogram!(
        "buildlogger_request_duration_seconds",
        "Request duration in seconds"
    );
    describe_counter!(
        "buildlogger_paginated_responses_total",
        "Responses truncated by the soft size limit"
    );
    describe_counter!(
        "buildlogger_global_metadata_fallback_total",
        "Test metadata lookups whose global supplement was not found"
    );
    describe_gauge!(
        "buildlogger_gateway_info",
        "Gateway version and build information"
    );

    gauge!("buildlogger_gateway_info", "version" => env!("CARGO_PKG_VERSION")).set(1.0);
}

/// Record a finished request
pub fn record_request(endpoint: &'static str, status: u16, duration: Duration) {
    counter!(
        "buildlogger_requests_total",
        "endpoint" => endpoint,
        "status" => status.to_string(),
    )
    .increment(1);
    histogram!("buildlogger_request_duration_seconds", "endpoint" => endpoint)
        .record(duration.as_secs_f64());
}

/// Record a response that carries pagination links
pub fn record_paginated(endpoint: &'static str) {
    counter!("buildlogger_paginated_responses_total", "endpoint" => endpoint).increment(1);
}

/// Record a global metadata lookup that found nothing
pub fn record_global_fallback() {
    counter!("buildlogger_global_metadata_fallback_total").increment(1);
}
