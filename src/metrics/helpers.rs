//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use super::{
    ACTIONS_INVALID_TOTAL, ACTIONS_RECEIVED_TOTAL, NOTIFICATIONS_PUBLISHED_TOTAL, RENDERS_TOTAL,
    RENDER_DURATION, TEMPLATES_REGISTERED, TEMPLATES_V2_ENABLED,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording render outcomes
pub struct RenderMetrics;

impl RenderMetrics {
    /// Record a successful render and its latency
    pub fn record_rendered(version: &str, seconds: f64) {
        RENDERS_TOTAL.with_label_values(&[version, "rendered"]).inc();
        RENDER_DURATION.with_label_values(&[version]).observe(seconds);
    }

    /// Record a failed render; `outcome` is the error kind
    pub fn record_failure(version: &str, outcome: &str) {
        RENDERS_TOTAL.with_label_values(&[version, outcome]).inc();
    }
}

/// Helper struct for template registry metrics
pub struct TemplateMetrics;

impl TemplateMetrics {
    pub fn set_registered(count: usize) {
        TEMPLATES_REGISTERED.set(count as i64);
    }

    pub fn set_v2_enabled(enabled: bool) {
        TEMPLATES_V2_ENABLED.set(if enabled { 1 } else { 0 });
    }
}

/// Helper struct for action ingestion metrics
pub struct ActionMetrics;

impl ActionMetrics {
    pub fn record_received() {
        ACTIONS_RECEIVED_TOTAL.inc();
    }

    pub fn record_invalid() {
        ACTIONS_INVALID_TOTAL.inc();
    }

    pub fn record_published() {
        NOTIFICATIONS_PUBLISHED_TOTAL.inc();
    }
}
