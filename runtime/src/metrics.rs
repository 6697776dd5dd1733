//! Prometheus metrics for observability and monitoring.
//!
//! The store records through the `metrics` facade; nothing is collected
//! unless a recorder is installed. [`MetricsRecorder`] installs the
//! Prometheus recorder and renders the text exposition format, leaving the
//! choice of transport to the application.
//!
//! # Example
//!
//! ```rust,no_run
//! use statecraft_runtime::metrics::MetricsRecorder;
//!
//! let mut recorder = MetricsRecorder::new();
//! recorder.install()?;
//!
//! // ... run stores ...
//!
//! if let Some(text) = recorder.render() {
//!     println!("{text}");
//! }
//! # Ok::<(), statecraft_runtime::metrics::MetricsError>(())
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Installs the Prometheus recorder and renders collected metrics.
#[derive(Default)]
pub struct MetricsRecorder {
    handle: Option<PrometheusHandle>,
}

impl MetricsRecorder {
    /// Create an uninstalled recorder.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Describe all store metrics and install the global Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns an error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// Only one global recorder can exist per process. If one is already
    /// installed (e.g. by another test), this succeeds without a handle and
    /// [`render`](Self::render) returns `None`.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                register_metrics();
                self.handle = Some(handle);
                tracing::info!("Prometheus metrics recorder installed");
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Get the Prometheus handle, if this recorder installed one.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!(
        "statecraft_actions_dispatched_total",
        "Total number of actions submitted, labelled by dispatch mode"
    );
    describe_counter!(
        "statecraft_reduce_cycles_total",
        "Total number of reduce cycles that published a state"
    );
    describe_histogram!(
        "statecraft_reduce_cycle_duration_seconds",
        "Time from state capture to the end of the after-hooks"
    );
    describe_counter!(
        "statecraft_listeners_notified_total",
        "Total number of listener notifications"
    );
    describe_counter!(
        "statecraft_errors_total",
        "Total number of reported errors, labelled by kind"
    );
    describe_gauge!(
        "statecraft_queue_depth",
        "Actions queued or in flight on the dispatcher"
    );
    describe_counter!(
        "statecraft_failed_actions_dropped_total",
        "Failed-action log entries evicted because the log was full"
    );
}

/// Store metrics recorder.
pub struct StoreMetrics;

impl StoreMetrics {
    /// Record an action submission.
    pub fn record_dispatch(mode: &'static str) {
        counter!("statecraft_actions_dispatched_total", "mode" => mode).increment(1);
    }

    /// Record a completed reduce cycle.
    pub fn record_cycle(duration: Duration, notified: usize) {
        counter!("statecraft_reduce_cycles_total").increment(1);
        counter!("statecraft_listeners_notified_total").increment(notified as u64);
        histogram!("statecraft_reduce_cycle_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a reported error.
    pub fn record_error(kind: &'static str) {
        counter!("statecraft_errors_total", "kind" => kind).increment(1);
    }
}
