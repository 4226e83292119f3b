//! Metrics helper structs for convenient metric recording

use std::time::Duration;

use prometheus::{Encoder, TextEncoder};

use super::{
    MESSAGES_SENT_TOTAL, SEND_LATENCY, TEMPLATES_REGISTERED_TOTAL, TEMPLATE_COMPILES_TOTAL,
    TEMPLATE_DUPLICATES_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording template metrics
pub struct TemplateMetrics;

impl TemplateMetrics {
    pub fn record_registered() {
        TEMPLATES_REGISTERED_TOTAL.inc();
    }

    pub fn record_duplicate() {
        TEMPLATE_DUPLICATES_TOTAL.inc();
    }

    /// Record a compile with its outcome label
    pub fn record_compile(outcome: &str) {
        TEMPLATE_COMPILES_TOTAL.with_label_values(&[outcome]).inc();
    }
}

/// Helper struct for recording send metrics
pub struct SendMetrics;

impl SendMetrics {
    pub fn record_delivered() {
        MESSAGES_SENT_TOTAL.with_label_values(&["delivered"]).inc();
    }

    pub fn record_dry_run() {
        MESSAGES_SENT_TOTAL.with_label_values(&["dry_run"]).inc();
    }

    pub fn record_failed() {
        MESSAGES_SENT_TOTAL.with_label_values(&["failed"]).inc();
    }

    pub fn observe_latency(elapsed: Duration) {
        SEND_LATENCY.observe(elapsed.as_secs_f64());
    }
}
