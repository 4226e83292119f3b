//! Prometheus metrics for template composition and delivery.
//!
//! - Template metrics (registrations, duplicate names, compiles)
//! - Send metrics (outcome counts, end-to-end latency)

mod helpers;

pub use helpers::{encode_metrics, SendMetrics, TemplateMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "mailwright";

lazy_static! {
    // ============================================================================
    // Template Metrics
    // ============================================================================

    /// Templates registered by discovery (duplicates included)
    pub static ref TEMPLATES_REGISTERED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_templates_registered_total", METRIC_PREFIX),
        "Total templates registered by discovery"
    ).unwrap();

    /// Registrations that replaced a template with the same name
    pub static ref TEMPLATE_DUPLICATES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_template_duplicates_total", METRIC_PREFIX),
        "Total duplicate template names seen during discovery"
    ).unwrap();

    /// Template compiles by outcome (success, failure)
    pub static ref TEMPLATE_COMPILES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_template_compiles_total", METRIC_PREFIX),
        "Total template compiles",
        &["outcome"]
    ).unwrap();

    // ============================================================================
    // Send Metrics
    // ============================================================================

    /// Sends by outcome (delivered, dry_run, failed)
    pub static ref MESSAGES_SENT_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_messages_sent_total", METRIC_PREFIX),
        "Total send requests",
        &["outcome"]
    ).unwrap();

    /// Time from send request to delivery (or failure)
    pub static ref SEND_LATENCY: Histogram = register_histogram!(
        format!("{}_send_latency_seconds", METRIC_PREFIX),
        "Send latency in seconds",
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    ).unwrap();
}
