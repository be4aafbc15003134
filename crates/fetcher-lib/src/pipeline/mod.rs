//! Per-kind extraction pipeline
//!
//! One pipeline run is fetch, then normalize, then merge-and-persist, for a
//! single aggregate kind. Kinds never share a dataset, so the driver runs
//! them concurrently without coordination.

mod driver;


pub use driver::{run_all, PipelineOutcome, PipelineReport};

use crate::client::AllocationClient;
use crate::error::PipelineError;
use crate::models::ReportWindow;
use crate::normalize::{dataset_key, normalize, KindDescriptor, ROLLOUT_DATASET};
use crate::observability::{FetcherMetrics, RunLogger};
use crate::storage::{DatasetStore, LocalMirror, MergeOutcome, ObjectStore};
use anyhow::Result;
use std::sync::Arc;

/// One dataset written by a pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetWrite {
    pub dataset: String,
    pub key: String,
    pub created: bool,
    pub appended: usize,
    pub total_rows: usize,
}

/// Result of a successful pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSummary {
    /// Datasets written, the kind's own dataset first
    pub datasets: Vec<DatasetWrite>,
}

impl PipelineSummary {
    /// Rows appended across every dataset of the run
    pub fn rows_appended(&self) -> usize {
        self.datasets.iter().map(|d| d.appended).sum()
    }
}

/// Collaborators shared by every pipeline of a run
#[derive(Clone)]
pub struct PipelineContext {
    client: AllocationClient,
    datasets: DatasetStore,
    mirror: Option<LocalMirror>,
    cluster_name: String,
    window: ReportWindow,
    logger: RunLogger,
    metrics: FetcherMetrics,
}

impl PipelineContext {
    pub fn window(&self) -> &ReportWindow {
        &self.window
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    pub fn logger(&self) -> &RunLogger {
        &self.logger
    }

    pub fn metrics(&self) -> &FetcherMetrics {
        &self.metrics
    }

    /// Write a prepared merge and mirror it locally if the kind asks for it
    async fn commit(
        &self,
        descriptor: &KindDescriptor,
        dataset: &str,
        outcome: MergeOutcome,
    ) -> Result<DatasetWrite, PipelineError> {
        self.datasets.commit(&outcome).await?;

        self.metrics.record_merge(dataset, &outcome);
        self.logger.log_dataset_written(descriptor.kind, &outcome);

        if descriptor.local_copy {
            if let Some(mirror) = &self.mirror {
                if let Err(e) = mirror.write(dataset, &outcome.body).await {
                    self.logger.log_mirror_failed(descriptor.kind, dataset, &e);
                }
            }
        }

        Ok(DatasetWrite {
            dataset: dataset.to_string(),
            key: outcome.key.clone(),
            created: outcome.created,
            appended: outcome.appended,
            total_rows: outcome.total_rows(),
        })
    }
}

/// Run one pipeline: fetch, normalize, then merge into the kind's datasets.
///
/// Nothing is written unless the whole response normalizes cleanly and
/// every dataset of the kind loads cleanly. For rollout-deriving kinds the
/// rollout dataset is merged after the kind's own dataset, even when no
/// rollout rows were found.
pub async fn run_pipeline(
    ctx: &PipelineContext,
    descriptor: &KindDescriptor,
) -> Result<PipelineSummary, PipelineError> {
    let kind = descriptor.kind;

    let response = ctx.client.fetch(&ctx.window, kind).await?;
    let items = response.item_count();
    ctx.logger.log_upstream_status(kind, &response.code, items);
    if items == 0 {
        ctx.logger.log_no_data(kind);
    }

    let rows = normalize(&response, descriptor, &ctx.cluster_name)?;

    let mut targets = vec![(descriptor.dataset_name(), descriptor.header(), &rows.primary)];
    if descriptor.rollout {
        targets.push((ROLLOUT_DATASET, descriptor.rollout_header(), &rows.rollout));
    }

    // load every dataset before the first put
    let mut prepared = Vec::with_capacity(targets.len());
    for (dataset, header, rows) in &targets {
        let outcome = ctx
            .datasets
            .prepare(&dataset_key(dataset), header, rows)
            .await?;
        prepared.push((*dataset, outcome));
    }

    let mut datasets = Vec::with_capacity(prepared.len());
    for (dataset, outcome) in prepared {
        datasets.push(ctx.commit(descriptor, dataset, outcome).await?);
    }

    Ok(PipelineSummary { datasets })
}

/// Builder for PipelineContext
pub struct PipelineContextBuilder {
    client: Option<AllocationClient>,
    store: Option<Arc<dyn ObjectStore>>,
    mirror: Option<LocalMirror>,
    cluster_name: Option<String>,
    window: Option<ReportWindow>,
}

impl PipelineContextBuilder {
    pub fn new() -> Self {
        Self {
            client: None,
            store: None,
            mirror: None,
            cluster_name: None,
            window: None,
        }
    }

    pub fn client(mut self, client: AllocationClient) -> Self {
        self.client = Some(client);
        self
    }

    pub fn store(mut self, store: Arc<dyn ObjectStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Local directory receiving debugging copies; unset disables them
    pub fn mirror(mut self, mirror: LocalMirror) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn cluster_name(mut self, name: impl Into<String>) -> Self {
        self.cluster_name = Some(name.into());
        self
    }

    pub fn window(mut self, window: ReportWindow) -> Self {
        self.window = Some(window);
        self
    }

    pub fn build(self) -> Result<PipelineContext> {
        let client = self
            .client
            .ok_or_else(|| anyhow::anyhow!("Allocation client is required"))?;
        let store = self
            .store
            .ok_or_else(|| anyhow::anyhow!("Object store is required"))?;
        let cluster_name = self
            .cluster_name
            .ok_or_else(|| anyhow::anyhow!("Cluster name is required"))?;
        let window = self
            .window
            .ok_or_else(|| anyhow::anyhow!("Report window is required"))?;

        Ok(PipelineContext {
            client,
            datasets: DatasetStore::new(store),
            mirror: self.mirror,
            logger: RunLogger::new(cluster_name.clone()),
            cluster_name,
            window,
            metrics: FetcherMetrics::new(),
        })
    }
}

impl Default for PipelineContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
