//! HTTP client for the cost model allocation API
//!
//! This module provides a client that:
//! - Builds `/model/allocation` queries for one aggregate kind and window
//! - Retries transport failures a bounded number of times with a fixed delay
//! - Decodes the response envelope into an [`AllocationResponse`]

use crate::allocation::AllocationResponse;
use crate::error::PipelineError;
use crate::models::{AggregateKind, ReportWindow};
use crate::observability::FetcherMetrics;
use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const ALLOCATION_PATH: &str = "model/allocation";

/// Configuration for the allocation client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Total requests per fetch, the first one included
    pub max_attempts: u32,
    /// Fixed wait between attempts
    pub retry_delay: Duration,
    /// Timeout for a single request, body included
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(2),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Client for the allocation endpoint of one cost model deployment
#[derive(Debug, Clone)]
pub struct AllocationClient {
    client: Client,
    endpoint: Url,
    config: ClientConfig,
    metrics: FetcherMetrics,
}

impl AllocationClient {
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// URL queried for `kind` over `window`
    pub fn allocation_url(&self, window: &ReportWindow, kind: AggregateKind) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("window", &window.to_string())
            .append_pair("aggregate", kind.as_param())
            .append_pair("accumulate", "true");
        url
    }

    /// Fetch and decode the allocations of `kind` over `window`.
    ///
    /// Transport failures (connect, timeout, truncated body) are retried up
    /// to `max_attempts` requests in total. The HTTP status is not checked:
    /// any body that decodes is accepted, and a body that does not decode is
    /// a [`PipelineError::Decode`] naming the status.
    pub async fn fetch(
        &self,
        window: &ReportWindow,
        kind: AggregateKind,
    ) -> Result<AllocationResponse, PipelineError> {
        let url = self.allocation_url(window, kind);
        let mut attempt = 0;

        let (status, body) = loop {
            attempt += 1;
            self.metrics.inc_fetch_attempts(kind);

            match self.request(url.clone()).await {
                Ok(response) => break response,
                Err(e) if attempt < self.config.max_attempts => {
                    warn!(
                        kind = %kind,
                        attempt = attempt,
                        max_attempts = self.config.max_attempts,
                        error = %e,
                        "Allocation request failed, retrying in {:?}",
                        self.config.retry_delay
                    );
                    self.metrics.inc_fetch_retries(kind);
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                Err(source) => {
                    return Err(PipelineError::Fetch {
                        kind,
                        attempts: attempt,
                        source,
                    })
                }
            }
        };

        debug!(kind = %kind, status = %status, bytes = body.len(), "Allocation response read");

        AllocationResponse::from_slice(&body).map_err(|reason| PipelineError::Decode {
            kind,
            reason: if status.is_success() {
                reason.to_string()
            } else {
                format!("HTTP {}: {}", status, reason)
            },
        })
    }

    async fn request(&self, url: Url) -> Result<(StatusCode, Vec<u8>), reqwest::Error> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        Ok((status, body.to_vec()))
    }
}

/// Builder for AllocationClient
pub struct AllocationClientBuilder {
    config: ClientConfig,
    endpoint: Option<String>,
}

impl AllocationClientBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            endpoint: None,
        }
    }

    /// Base URL of the cost model, e.g. `http://kubecost-cost-analyzer:9090`
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.config.retry_delay = delay;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<AllocationClient> {
        let base = self
            .endpoint
            .ok_or_else(|| anyhow::anyhow!("endpoint is required"))?;

        if self.config.max_attempts == 0 {
            anyhow::bail!("max_attempts must be at least 1");
        }

        let endpoint = Url::parse(&format!("{}/", base.trim_end_matches('/')))
            .and_then(|base| base.join(ALLOCATION_PATH))
            .with_context(|| format!("Invalid allocation endpoint: {}", base))?;

        let client = Client::builder()
            .timeout(self.config.request_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(AllocationClient {
            client,
            endpoint,
            config: self.config,
            metrics: FetcherMetrics::new(),
        })
    }
}

impl Default for AllocationClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
