//! Library for extracting Kubernetes cost efficiency data
//!
//! This crate provides the core functionality for:
//! - Fetching allocation reports from the cost model API
//! - Normalizing per-kind allocation items into fixed-width rows
//! - Appending rows to durable CSV datasets in object storage
//! - Running one pipeline per aggregate kind concurrently
//! - Metrics and structured logging

pub mod allocation;
pub mod client;
pub mod error;
pub mod models;
pub mod normalize;
pub mod observability;
pub mod pipeline;
pub mod storage;

pub use client::{AllocationClient, AllocationClientBuilder};
pub use error::{EnvelopeError, FieldError, PipelineError, StorageError};
pub use models::*;
pub use normalize::KindDescriptor;
pub use observability::{FetcherMetrics, RunLogger};
pub use pipeline::{
    run_all, run_pipeline, PipelineContext, PipelineContextBuilder, PipelineOutcome,
    PipelineReport,
};
