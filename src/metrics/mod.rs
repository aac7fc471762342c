//! Prometheus metrics for the notifications engine.
//!
//! - Render metrics (outcomes by version, render latency)
//! - Template registry metrics
//! - Action ingestion and Redis subscriber metrics
//! - Feature-flag state

mod helpers;

pub use helpers::{encode_metrics, ActionMetrics, RenderMetrics, TemplateMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    HistogramVec, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "notif";

lazy_static! {
    // ============================================================================
    // Render Metrics
    // ============================================================================

    /// Render attempts by version cohort and outcome
    pub static ref RENDERS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_renders_total", METRIC_PREFIX),
        "Total render attempts",
        &["version", "outcome"]
    ).unwrap();

    /// Time spent resolving and rendering one action
    pub static ref RENDER_DURATION: HistogramVec = register_histogram_vec!(
        format!("{}_render_duration_seconds", METRIC_PREFIX),
        "Render latency in seconds",
        &["version"],
        vec![0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05]
    ).unwrap();

    // ============================================================================
    // Template Metrics
    // ============================================================================

    /// Number of (descriptor, version) definitions in the live registry
    pub static ref TEMPLATES_REGISTERED: IntGauge = register_int_gauge!(
        format!("{}_templates_registered", METRIC_PREFIX),
        "Number of registered template definitions"
    ).unwrap();

    /// Whether v2 templates are enabled globally (1 = v2, 0 = legacy)
    pub static ref TEMPLATES_V2_ENABLED: IntGauge = register_int_gauge!(
        format!("{}_templates_v2_enabled", METRIC_PREFIX),
        "Global template v2 flag (1=v2, 0=legacy)"
    ).unwrap();

    // ============================================================================
    // Ingestion Metrics
    // ============================================================================

    /// Actions received from the ingestion channel
    pub static ref ACTIONS_RECEIVED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_actions_received_total", METRIC_PREFIX),
        "Total actions received"
    ).unwrap();

    /// Payloads that could not be parsed as an action
    pub static ref ACTIONS_INVALID_TOTAL: IntCounter = register_int_counter!(
        format!("{}_actions_invalid_total", METRIC_PREFIX),
        "Total unparseable action payloads"
    ).unwrap();

    /// Rendered notifications handed to the delivery channel
    pub static ref NOTIFICATIONS_PUBLISHED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_notifications_published_total", METRIC_PREFIX),
        "Total rendered notifications published for delivery"
    ).unwrap();

    // ============================================================================
    // Redis Metrics
    // ============================================================================

    /// Redis connection status (1 = connected, 0 = disconnected)
    pub static ref REDIS_CONNECTION_STATUS: IntGauge = register_int_gauge!(
        format!("{}_redis_connection_status", METRIC_PREFIX),
        "Redis connection status (1=connected, 0=disconnected)"
    ).unwrap();

    /// Total Redis reconnection attempts
    pub static ref REDIS_RECONNECTIONS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_redis_reconnections_total", METRIC_PREFIX),
        "Total Redis reconnection attempts"
    ).unwrap();
}
