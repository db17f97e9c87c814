//! Observability infrastructure for the monitor
//!
//! Provides:
//! - Prometheus metrics (recorded events, samples, constructed intervals, disruption, verdicts)
//! - Structured JSON logging with tracing

use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<MonitorMetricsInner> = OnceLock::new();

struct MonitorMetricsInner {
    events_recorded: IntCounter,
    samples_recorded: IntCounter,
    out_of_order_events: IntCounter,
    intervals_constructed: IntCounter,
    disruption_transitions: IntCounterVec,
    verdicts: IntCounterVec,
}

impl MonitorMetricsInner {
    fn new() -> Self {
        Self {
            events_recorded: register_int_counter!(
                "cluster_monitor_events_recorded_total",
                "Instant events recorded by the monitor"
            )
            .expect("Failed to register events_recorded"),

            samples_recorded: register_int_counter!(
                "cluster_monitor_samples_recorded_total",
                "Sampling ticks stored by the monitor"
            )
            .expect("Failed to register samples_recorded"),

            out_of_order_events: register_int_counter!(
                "cluster_monitor_out_of_order_events_total",
                "Events found out of time order while merging"
            )
            .expect("Failed to register out_of_order_events"),

            intervals_constructed: register_int_counter!(
                "cluster_monitor_intervals_constructed_total",
                "Intervals derived by interval creators"
            )
            .expect("Failed to register intervals_constructed"),

            disruption_transitions: register_int_counter_vec!(
                "cluster_monitor_disruption_transitions_total",
                "Backend disruption state changes",
                &["backend", "reason"]
            )
            .expect("Failed to register disruption_transitions"),

            verdicts: register_int_counter_vec!(
                "cluster_monitor_verdicts_total",
                "Verdicts produced, by outcome",
                &["outcome"]
            )
            .expect("Failed to register verdicts"),
        }
    }
}

/// Monitor metrics for Prometheus exposition
///
/// A lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct MonitorMetrics {
    _private: (),
}

impl Default for MonitorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &MonitorMetricsInner {
        GLOBAL_METRICS.get_or_init(MonitorMetricsInner::new)
    }

    pub fn add_events_recorded(&self, count: usize) {
        self.inner().events_recorded.inc_by(count as u64);
    }

    pub fn inc_samples_recorded(&self) {
        self.inner().samples_recorded.inc();
    }

    pub fn inc_out_of_order_events(&self) {
        self.inner().out_of_order_events.inc();
    }

    pub fn add_intervals_constructed(&self, count: usize) {
        self.inner().intervals_constructed.inc_by(count as u64);
    }

    pub fn inc_disruption_transition(&self, backend: &str, reason: &str) {
        self.inner()
            .disruption_transitions
            .with_label_values(&[backend, reason])
            .inc();
    }

    pub fn inc_verdict(&self, outcome: &str) {
        self.inner().verdicts.with_label_values(&[outcome]).inc();
    }
}

/// Structured logger for monitor lifecycle and verdict events
#[derive(Clone)]
pub struct StructuredLogger {
    run_id: String,
}

impl StructuredLogger {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
        }
    }

    pub fn log_startup(&self, version: &str, backends: usize, sample_interval_secs: u64) {
        info!(
            event = "monitor_started",
            run_id = %self.run_id,
            monitor_version = %version,
            backends = backends,
            sample_interval_secs = sample_interval_secs,
            "Cluster monitor started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "monitor_shutdown",
            run_id = %self.run_id,
            reason = %reason,
            "Cluster monitor shutting down"
        );
    }

    /// Log a backend starting or stopping to respond
    pub fn log_disruption_transition(&self, locator: &str, reason: &str, message: &str) {
        warn!(
            event = "disruption_transition",
            run_id = %self.run_id,
            locator = %locator,
            reason = %reason,
            message = %message,
            "Backend availability changed"
        );
    }

    pub fn log_verdict(&self, test_name: &str, outcome: &str) {
        match outcome {
            "failed" => warn!(
                event = "verdict",
                run_id = %self.run_id,
                test = %test_name,
                outcome = %outcome,
                "Test failed"
            ),
            _ => info!(
                event = "verdict",
                run_id = %self.run_id,
                test = %test_name,
                outcome = %outcome,
                "Test evaluated"
            ),
        }
    }

    pub fn log_artifact_written(&self, path: &str, items: usize) {
        info!(
            event = "artifact_written",
            run_id = %self.run_id,
            path = %path,
            items = items,
            "Run artifact written"
        );
    }
}
