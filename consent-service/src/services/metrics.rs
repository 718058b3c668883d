//! Metrics collection and Prometheus export.

use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use service_core::error::AppError;
use std::sync::OnceLock;

/// Global handle to the Prometheus recorder.
pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Call once at startup.
pub fn init_metrics() -> Result<(), AppError> {
    let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
        AppError::ConfigError(anyhow::anyhow!("failed to install Prometheus recorder: {}", e))
    })?;

    METRICS_HANDLE
        .set(handle)
        .map_err(|_| AppError::ConfigError(anyhow::anyhow!("metrics already initialized")))
}

/// Current metrics in Prometheus text format.
pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized".to_string())
}

pub fn record_grant() {
    counter!("consent_grants_total").increment(1);
}

pub fn record_revocation() {
    counter!("consent_revocations_total").increment(1);
}

pub fn record_share_validation(outcome: &'static str) {
    counter!("share_token_validations_total", "outcome" => outcome).increment(1);
}

pub fn record_embed_resolution(outcome: &'static str) {
    counter!("embed_resolutions_total", "outcome" => outcome).increment(1);
}

pub fn record_tag_transition(status: &'static str) {
    counter!("face_tag_transitions_total", "status" => status).increment(1);
}

/// Database query latency for the operations that hold row locks.
pub fn record_db_query(operation: &'static str, started: std::time::Instant) {
    metrics::histogram!("db_query_duration_seconds", "operation" => operation)
        .record(started.elapsed().as_secs_f64());
}
