use axum::{http::StatusCode, response::IntoResponse};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use rdap_service::TargetResult;
use std::sync::OnceLock;
use tracing::{error, warn};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub fn init_metrics() {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROMETHEUS_HANDLE.set(handle).is_err() {
                warn!("Metrics recorder already initialized");
            }

            // Initialize metrics with zero values
            counter!("rdap_requests_total", "kind" => "unknown").absolute(0);
            counter!("rdap_cache_hits_total").absolute(0);
            counter!("rdap_cache_misses_total").absolute(0);
            counter!("rdap_errors_total", "error_type" => "unknown").absolute(0);
            gauge!("rdap_keys_cached_total").set(0.0);
            histogram!("rdap_request_duration_seconds").record(0.0);
        }
        Err(e) => {
            error!("Failed to install metrics recorder: {}", e);
        }
    }
}

/// Records one per-target outcome from a batch
pub fn record_result(result: &TargetResult) {
    let kind = match (&result.data, result.failure) {
        (Some(data), _) if data.is_whois() => "whois",
        (Some(_), _) => "rdap",
        (None, Some(failure)) => failure,
        (None, None) => "unknown",
    };
    counter!("rdap_requests_total", "kind" => kind).increment(1);

    if result.cached {
        counter!("rdap_cache_hits_total").increment(1);
    } else if result.success {
        counter!("rdap_cache_misses_total").increment(1);
    }

    if let Some(failure) = result.failure {
        increment_errors(failure);
    }
}

pub fn increment_errors(error_type: &str) {
    counter!("rdap_errors_total", "error_type" => error_type.to_string()).increment(1);
}

pub fn record_query_time(duration_ms: u64) {
    let duration_seconds = duration_ms as f64 / 1000.0;
    histogram!("rdap_request_duration_seconds").record(duration_seconds);
}

pub fn set_cached_keys(count: usize) {
    gauge!("rdap_keys_cached_total").set(count as f64);
}

pub async fn metrics_handler() -> impl IntoResponse {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::SERVICE_UNAVAILABLE, "Metrics not initialized".to_string()),
    }
}
