//! Kubecost Fetcher - daily cost efficiency extraction
//!
//! This binary runs as a batch job: it fetches one day of allocation data
//! per aggregate kind, appends it to the CSV datasets in S3 and exits.

use anyhow::Result;
use chrono::Utc;
use fetcher_lib::{
    run_all,
    storage::{LocalMirror, S3Store},
    AllocationClientBuilder, PipelineContextBuilder,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting kubecost-fetcher");

    let config = config::FetcherConfig::load()?;
    let window = config.report_window(Utc::now())?;
    let descriptors = config.descriptors();
    info!(
        cluster = %config.cluster_name,
        bucket = %config.bucket_name,
        region = %config.bucket_region,
        window = %window,
        "Fetcher configured"
    );

    let client = AllocationClientBuilder::new()
        .endpoint(&config.kubecost_endpoint)
        .max_attempts(config.max_attempts)
        .retry_delay(config.retry_delay())
        .request_timeout(config.request_timeout())
        .build()?;

    let store = S3Store::new(&config.bucket_name, &config.bucket_region).await;

    let mut builder = PipelineContextBuilder::new()
        .client(client)
        .store(Arc::new(store))
        .cluster_name(&config.cluster_name)
        .window(window);
    if config.local_copy {
        builder = builder.mirror(LocalMirror::new(&config.output_dir));
    }
    let ctx = Arc::new(builder.build()?);

    let reports = run_all(Arc::clone(&ctx), descriptors).await;
    for report in &reports {
        info!(
            kind = %report.kind,
            outcome = report.outcome.label(),
            duration_secs = report.duration.as_secs_f64(),
            "Pipeline report"
        );
    }

    if let Some(path) = &config.metrics_textfile {
        match ctx.metrics().write_textfile(path).await {
            Ok(()) => info!(path = ?path, "Metrics exported"),
            Err(e) => warn!(path = ?path, error = %e, "Failed to export metrics"),
        }
    }

    // Per-kind failures are reported above; they do not change the exit status
    Ok(())
}
