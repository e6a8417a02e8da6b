//! Application metrics for Prometheus monitoring.
//!
//! This module provides:
//! - Prometheus metrics recorder initialization
//! - Job and probe metric definitions
//! - Helper functions for recording them

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

use mediadl_core::MediaKind;

use crate::jobs::JobState;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// Call once at startup, before any metrics are recorded.
/// Returns `true` if initialization succeeded, `false` if already initialized.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        return false;
    }

    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    if metrics::set_global_recorder(recorder).is_err() {
        tracing::warn!("Failed to set global metrics recorder (already set)");
        return false;
    }

    if PROMETHEUS_HANDLE.set(handle).is_err() {
        tracing::warn!("Failed to store Prometheus handle (already set)");
    }

    describe_metrics();

    tracing::info!("Prometheus metrics initialized");
    true
}

fn describe_metrics() {
    describe_counter!("jobs_submitted_total", "Download jobs accepted, by media kind");
    describe_counter!("jobs_finished_total", "Download jobs that reached a terminal state, by outcome");
    describe_histogram!("job_duration_seconds", "Wall time from job start to terminal state");
    describe_counter!("metadata_probes_total", "Metadata probes run, by outcome");
}

/// Render current metrics in Prometheus text format.
///
/// Returns `None` if metrics are not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|h| h.render())
}

pub fn record_job_submitted(kind: MediaKind) {
    counter!("jobs_submitted_total", "kind" => kind.as_str()).increment(1);
}

pub fn record_job_finished(outcome: JobState, duration: Duration) {
    counter!("jobs_finished_total", "outcome" => outcome.as_str()).increment(1);
    histogram!("job_duration_seconds", "outcome" => outcome.as_str())
        .record(duration.as_secs_f64());
}

pub fn record_probe(ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    counter!("metadata_probes_total", "outcome" => outcome).increment(1);
}
