//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Engine acquisition latency
//! - Individual conversion attempts per stream hypothesis
//! - Session outcomes

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};

// =============================================================================
// Engine Metrics
// =============================================================================

/// Engine acquisition duration in seconds.
pub static ENGINE_ACQUIRE_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "heics_engine_acquire_duration_seconds",
            "Time spent acquiring a processing engine",
        )
        .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["result"], // "success", "failed"
    )
    .unwrap()
});

// =============================================================================
// Conversion Metrics
// =============================================================================

/// Conversion attempts by format, hypothesis and result.
pub static CONVERSION_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "heics_conversion_attempts_total",
            "Engine runs issued per stream hypothesis",
        ),
        &["format", "hypothesis", "result"], // result: "success", "failed", "error"
    )
    .unwrap()
});

/// Conversion sessions by format and outcome.
pub static SESSIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("heics_sessions_total", "Conversion sessions by outcome"),
        &["format", "result"], // "succeeded", "failed"
    )
    .unwrap()
});

/// Returns all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(ENGINE_ACQUIRE_DURATION.clone()),
        Box::new(CONVERSION_ATTEMPTS.clone()),
        Box::new(SESSIONS_TOTAL.clone()),
    ]
}
