//! Observability infrastructure for the efficiency fetcher
//!
//! Provides:
//! - Prometheus metrics (fetch attempts, rows appended, pipeline outcomes and duration)
//! - Export of the metrics to a node-exporter textfile at the end of a run
//! - Structured JSON logging of run lifecycle events with tracing

use crate::error::PipelineError;
use crate::models::{AggregateKind, ReportWindow};
use crate::storage::MergeOutcome;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge_vec, Encoder,
    HistogramVec, IntCounterVec, IntGaugeVec, TextEncoder,
};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for whole-pipeline durations (in seconds)
const DURATION_BUCKETS: &[f64] = &[0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<FetcherMetricsInner> = OnceLock::new();

struct FetcherMetricsInner {
    fetch_attempts: IntCounterVec,
    fetch_retries: IntCounterVec,
    rows_appended: IntCounterVec,
    dataset_rows: IntGaugeVec,
    pipeline_runs: IntCounterVec,
    pipeline_duration_seconds: HistogramVec,
}

impl FetcherMetricsInner {
    fn new() -> Self {
        Self {
            fetch_attempts: register_int_counter_vec!(
                "kubecost_fetcher_fetch_attempts_total",
                "Allocation API requests issued, retries included",
                &["kind"]
            )
            .expect("Failed to register fetch_attempts_total"),

            fetch_retries: register_int_counter_vec!(
                "kubecost_fetcher_fetch_retries_total",
                "Allocation API requests retried after a transport error",
                &["kind"]
            )
            .expect("Failed to register fetch_retries_total"),

            rows_appended: register_int_counter_vec!(
                "kubecost_fetcher_rows_appended_total",
                "Rows appended to each dataset",
                &["dataset"]
            )
            .expect("Failed to register rows_appended_total"),

            dataset_rows: register_int_gauge_vec!(
                "kubecost_fetcher_dataset_rows",
                "Data rows in each dataset after the last merge",
                &["dataset"]
            )
            .expect("Failed to register dataset_rows"),

            pipeline_runs: register_int_counter_vec!(
                "kubecost_fetcher_pipeline_runs_total",
                "Pipeline runs by kind and outcome",
                &["kind", "outcome"]
            )
            .expect("Failed to register pipeline_runs_total"),

            pipeline_duration_seconds: register_histogram_vec!(
                "kubecost_fetcher_pipeline_duration_seconds",
                "Wall time of one pipeline run from fetch to persist",
                &["kind"],
                DURATION_BUCKETS.to_vec()
            )
            .expect("Failed to register pipeline_duration_seconds"),
        }
    }
}

/// Fetcher metrics handle
///
/// Clones share the process-global metrics.
#[derive(Debug, Clone)]
pub struct FetcherMetrics {
    _private: (),
}

impl Default for FetcherMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl FetcherMetrics {
    /// Create a new metrics handle (registers global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(FetcherMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &FetcherMetricsInner {
        GLOBAL_METRICS.get_or_init(FetcherMetricsInner::new)
    }

    pub fn inc_fetch_attempts(&self, kind: AggregateKind) {
        self.inner()
            .fetch_attempts
            .with_label_values(&[kind.as_param()])
            .inc();
    }

    pub fn inc_fetch_retries(&self, kind: AggregateKind) {
        self.inner()
            .fetch_retries
            .with_label_values(&[kind.as_param()])
            .inc();
    }

    /// Record the result of one dataset merge
    pub fn record_merge(&self, dataset: &str, outcome: &MergeOutcome) {
        self.inner()
            .rows_appended
            .with_label_values(&[dataset])
            .inc_by(outcome.appended as u64);
        self.inner()
            .dataset_rows
            .with_label_values(&[dataset])
            .set(outcome.total_rows() as i64);
    }

    /// Record a finished pipeline. `outcome` is `success` or the failing stage.
    pub fn record_pipeline(&self, kind: AggregateKind, outcome: &str, duration_secs: f64) {
        self.inner()
            .pipeline_runs
            .with_label_values(&[kind.as_param(), outcome])
            .inc();
        self.inner()
            .pipeline_duration_seconds
            .with_label_values(&[kind.as_param()])
            .observe(duration_secs);
    }

    /// Write every registered metric to `path` in Prometheus text format.
    ///
    /// The file is written next to its destination and renamed into place so
    /// a collector never reads a partial export.
    pub async fn write_textfile(&self, path: &Path) -> anyhow::Result<()> {
        use anyhow::Context;

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&prometheus::gather(), &mut buffer)
            .context("Failed to encode metrics")?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }

        let tmp = path.with_extension("prom.tmp");
        tokio::fs::write(&tmp, &buffer)
            .await
            .with_context(|| format!("Failed to write {:?}", tmp))?;
        tokio::fs::rename(&tmp, path)
            .await
            .with_context(|| format!("Failed to move metrics into {:?}", path))?;

        Ok(())
    }
}

/// Structured logger for run lifecycle events
#[derive(Debug, Clone)]
pub struct RunLogger {
    cluster_name: String,
}

impl RunLogger {
    pub fn new(cluster_name: impl Into<String>) -> Self {
        Self {
            cluster_name: cluster_name.into(),
        }
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    pub fn log_run_started(&self, window: &ReportWindow, kinds: usize) {
        info!(
            event = "run_started",
            cluster = %self.cluster_name,
            window = %window,
            kinds = kinds,
            "Efficiency fetch started"
        );
    }

    /// Log the status code embedded in an allocation response
    pub fn log_upstream_status(&self, kind: AggregateKind, code: &serde_json::Value, items: usize) {
        info!(
            event = "upstream_status",
            cluster = %self.cluster_name,
            kind = %kind,
            code = %code,
            items = items,
            "Allocation response received"
        );
    }

    pub fn log_no_data(&self, kind: AggregateKind) {
        info!(
            event = "no_data",
            cluster = %self.cluster_name,
            kind = %kind,
            "Allocation response carried no items for this window"
        );
    }

    pub fn log_dataset_written(&self, kind: AggregateKind, outcome: &MergeOutcome) {
        if outcome.created {
            info!(
                event = "dataset_created",
                cluster = %self.cluster_name,
                kind = %kind,
                key = %outcome.key,
                rows = outcome.appended,
                "Dataset created"
            );
        } else {
            info!(
                event = "dataset_appended",
                cluster = %self.cluster_name,
                kind = %kind,
                key = %outcome.key,
                existing_rows = outcome.existing_rows,
                appended = outcome.appended,
                "Rows appended to dataset"
            );
        }
    }

    pub fn log_mirror_failed(&self, kind: AggregateKind, dataset: &str, error: &std::io::Error) {
        warn!(
            event = "local_copy_failed",
            cluster = %self.cluster_name,
            kind = %kind,
            dataset = %dataset,
            error = %error,
            "Failed to write local dataset copy"
        );
    }

    pub fn log_pipeline_succeeded(&self, kind: AggregateKind, rows: usize, duration_secs: f64) {
        info!(
            event = "pipeline_succeeded",
            cluster = %self.cluster_name,
            kind = %kind,
            rows = rows,
            duration_secs = duration_secs,
            "Pipeline finished"
        );
    }

    pub fn log_pipeline_failed(&self, kind: AggregateKind, error: &PipelineError) {
        warn!(
            event = "pipeline_failed",
            cluster = %self.cluster_name,
            kind = %kind,
            stage = error.stage(),
            error = %error,
            "Pipeline failed, dataset left unchanged"
        );
    }

    /// Log a task that ended without a result (panicked or was aborted)
    pub fn log_pipeline_lost(&self, kind: AggregateKind, reason: &str) {
        warn!(
            event = "pipeline_failed",
            cluster = %self.cluster_name,
            kind = %kind,
            stage = "task",
            error = %reason,
            "Pipeline task ended abnormally"
        );
    }

    pub fn log_run_finished(&self, succeeded: usize, failed: usize) {
        if failed == 0 {
            info!(
                event = "run_finished",
                cluster = %self.cluster_name,
                succeeded = succeeded,
                failed = failed,
                "Efficiency fetch finished"
            );
        } else {
            warn!(
                event = "run_finished",
                cluster = %self.cluster_name,
                succeeded = succeeded,
                failed = failed,
                "Efficiency fetch finished with failures"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_metrics_handles_share_registry() {
        let metrics = FetcherMetrics::new();
        let other = FetcherMetrics::new();

        metrics.inc_fetch_attempts(AggregateKind::Node);
        other.inc_fetch_retries(AggregateKind::Node);
        metrics.record_pipeline(AggregateKind::Node, "success", 0.3);
    }

    #[tokio::test]
    async fn test_write_textfile() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("textfile").join("fetcher.prom");

        let metrics = FetcherMetrics::new();
        metrics.record_merge(
            "Namespace",
            &MergeOutcome {
                key: "Namespace/Namespace.csv".to_string(),
                created: true,
                existing_rows: 0,
                appended: 2,
                body: Vec::new(),
            },
        );

        metrics.write_textfile(&path).await.unwrap();

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(text.contains("kubecost_fetcher_rows_appended_total"));
        assert!(text.contains("dataset=\"Namespace\""));
        assert!(!path.with_extension("prom.tmp").exists());
    }

    #[test]
    fn test_run_logger_creation() {
        let logger = RunLogger::new("prod-eu");
        assert_eq!(logger.cluster_name(), "prod-eu");
    }
}
