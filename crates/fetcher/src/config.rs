//! Fetcher configuration

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fetcher_lib::{AggregateKind, KindDescriptor, ReportWindow};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const ENV_PREFIX: &str = "FETCHER";

/// Fetcher configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FetcherConfig {
    /// Base URL of the cost model API
    pub kubecost_endpoint: String,

    /// Cluster display name written to every row
    pub cluster_name: String,

    /// Bucket receiving the datasets
    pub bucket_name: String,

    #[serde(default = "default_bucket_region")]
    pub bucket_region: String,

    /// Report window override as `start,end`; yesterday otherwise
    #[serde(default)]
    pub window: Option<String>,

    /// Kinds to run
    #[serde(default = "default_kinds")]
    pub kinds: Vec<AggregateKind>,

    /// Kinds whose datasets carry a `Shared Cost` column; per-kind defaults when unset
    #[serde(default)]
    pub shared_cost_kinds: Option<Vec<AggregateKind>>,

    /// Directory for local dataset copies
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default = "default_local_copy")]
    pub local_copy: bool,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Prometheus textfile written at the end of the run
    #[serde(default)]
    pub metrics_textfile: Option<PathBuf>,
}

fn default_bucket_region() -> String {
    "us-east-1".to_string()
}

fn default_kinds() -> Vec<AggregateKind> {
    AggregateKind::ALL.to_vec()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("Output")
}

fn default_local_copy() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    2
}

fn default_request_timeout() -> u64 {
    30
}

impl FetcherConfig {
    /// Load configuration from `FETCHER_*` environment variables
    pub fn load() -> Result<Self> {
        Self::from_environment(environment())
    }

    fn from_environment(environment: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(environment)
            .build()
            .context("Failed to read configuration")?;

        let config: FetcherConfig = config
            .try_deserialize()
            .context("Invalid configuration (FETCHER_KUBECOST_ENDPOINT, FETCHER_CLUSTER_NAME and FETCHER_BUCKET_NAME are required)")?;

        if config.kinds.is_empty() {
            anyhow::bail!("FETCHER_KINDS must name at least one kind");
        }

        Ok(config)
    }

    /// Window to report on, relative to `now` unless overridden
    pub fn report_window(&self, now: DateTime<Utc>) -> Result<ReportWindow> {
        match &self.window {
            Some(window) => window
                .parse()
                .with_context(|| format!("Invalid FETCHER_WINDOW: {}", window)),
            None => Ok(ReportWindow::previous_day(now)),
        }
    }

    /// Dataset layout of every configured kind, duplicates dropped
    pub fn descriptors(&self) -> Vec<KindDescriptor> {
        let mut kinds = self.kinds.clone();
        let mut seen = Vec::with_capacity(kinds.len());
        kinds.retain(|kind| {
            if seen.contains(kind) {
                false
            } else {
                seen.push(*kind);
                true
            }
        });

        kinds
            .into_iter()
            .map(|kind| {
                let descriptor = KindDescriptor::for_kind(kind);
                match &self.shared_cost_kinds {
                    Some(shared) => descriptor.with_shared_cost(shared.contains(&kind)),
                    None => descriptor,
                }
            })
            .collect()
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("kinds")
        .with_list_parse_key("shared_cost_kinds")
}
