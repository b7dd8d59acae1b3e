//! Prometheus metrics for the extraction pipeline
//!
//! Tracks per-source outcomes, rejected candidates, content checks, accepted
//! items and keyword matches.
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, or it is never called, every recording function
//! is a no-op.

use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for all pipeline metrics
struct PipelineMetrics {
    source_runs: CounterVec,
    source_duration: HistogramVec,
    candidates_rejected: CounterVec,
    content_checks: CounterVec,
    items_accepted: CounterVec,
    keyword_matches: CounterVec,
}

static PIPELINE_METRICS: OnceLock<PipelineMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// Safe to call more than once; only the first call registers.
///
/// # Example
///
/// ```ignore
/// if let Err(e) = hotsift::metrics::init_metrics() {
///     eprintln!("Warning: Metrics initialization failed: {}", e);
/// }
/// ```
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    // Prevent double initialization
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let metrics = PipelineMetrics {
        source_runs: register_counter_vec!(
            "hotsift_source_runs_total",
            "Source crawls by platform and outcome",
            &["platform", "outcome"]
        )?,
        source_duration: register_histogram_vec!(
            "hotsift_source_duration_seconds",
            "Time spent crawling one source including retries",
            &["platform"],
            vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]
        )?,
        candidates_rejected: register_counter_vec!(
            "hotsift_candidates_rejected_total",
            "Candidates rejected by the synchronous filter",
            &["reason"]
        )?,
        content_checks: register_counter_vec!(
            "hotsift_content_checks_total",
            "Article page content checks by outcome",
            &["outcome"]
        )?,
        items_accepted: register_counter_vec!(
            "hotsift_items_accepted_total",
            "Items emitted per platform",
            &["platform"]
        )?,
        keyword_matches: register_counter_vec!(
            "hotsift_keyword_matches_total",
            "Titles matched per keyword group",
            &["group"]
        )?,
    };

    PIPELINE_METRICS
        .set(metrics)
        .map_err(|_| "Pipeline metrics already initialized")?;

    Ok(())
}

/// Check if metrics are initialized
pub fn metrics_initialized() -> bool {
    PIPELINE_METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Histogram timer guard that records duration on drop
pub struct MetricsTimer {
    timer: Option<prometheus::HistogramTimer>,
}

impl MetricsTimer {
    fn new(timer: prometheus::HistogramTimer) -> Self {
        Self { timer: Some(timer) }
    }

    /// Create a no-op timer when metrics are not initialized
    fn noop() -> Self {
        Self { timer: None }
    }
}

impl Drop for MetricsTimer {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.stop_and_record();
        }
    }
}

/// Start a timer for one source crawl
pub fn start_source_timer(platform: &str) -> MetricsTimer {
    match PIPELINE_METRICS.get() {
        Some(m) => MetricsTimer::new(m.source_duration.with_label_values(&[platform]).start_timer()),
        None => MetricsTimer::noop(),
    }
}

/// Record the outcome of one source: `success`, `empty` or an error category
pub fn record_source_run(platform: &str, outcome: &str) {
    if let Some(m) = PIPELINE_METRICS.get() {
        m.source_runs.with_label_values(&[platform, outcome]).inc();
    }
}

/// Record a candidate rejected by the filter
pub fn record_rejection(reason: &str) {
    if let Some(m) = PIPELINE_METRICS.get() {
        m.candidates_rejected.with_label_values(&[reason]).inc();
    }
}

/// Record one content check
pub fn record_content_check(has_content: bool) {
    if let Some(m) = PIPELINE_METRICS.get() {
        let outcome = if has_content { "content" } else { "empty" };
        m.content_checks.with_label_values(&[outcome]).inc();
    }
}

/// Record items emitted by a platform
pub fn record_items_accepted(platform: &str, count: usize) {
    let Some(m) = PIPELINE_METRICS.get() else {
        return;
    };
    if count > 0 {
        m.items_accepted
            .with_label_values(&[platform])
            .inc_by(count as f64);
    }
}

/// Record a keyword group match
pub fn record_keyword_match(group: &str) {
    if let Some(m) = PIPELINE_METRICS.get() {
        m.keyword_matches.with_label_values(&[group]).inc();
    }
}

// ============================================================================
// Tests
// ============================================================================
