//! Concurrent fan-out of one pipeline per kind

use super::{run_pipeline, PipelineContext, PipelineSummary};
use crate::error::PipelineError;
use crate::models::AggregateKind;
use crate::normalize::KindDescriptor;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How one kind's pipeline ended
#[derive(Debug)]
pub enum PipelineOutcome {
    Succeeded(PipelineSummary),
    Failed(PipelineError),
    /// The task panicked or was cancelled before producing a result
    Aborted(String),
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineOutcome::Succeeded(_))
    }

    /// `success`, the failing stage, or `aborted`
    pub fn label(&self) -> &'static str {
        match self {
            PipelineOutcome::Succeeded(_) => "success",
            PipelineOutcome::Failed(e) => e.stage(),
            PipelineOutcome::Aborted(_) => "aborted",
        }
    }
}

/// Per-kind result collected by [`run_all`]
#[derive(Debug)]
pub struct PipelineReport {
    pub kind: AggregateKind,
    pub outcome: PipelineOutcome,
    pub duration: Duration,
}

/// Run one pipeline per descriptor concurrently and wait for all of them.
///
/// A failing or panicking pipeline never affects its siblings. Reports are
/// returned in descriptor order.
pub async fn run_all(
    ctx: Arc<PipelineContext>,
    descriptors: Vec<KindDescriptor>,
) -> Vec<PipelineReport> {
    ctx.logger.log_run_started(&ctx.window, descriptors.len());
    let started = Instant::now();

    let handles: Vec<_> = descriptors
        .into_iter()
        .map(|descriptor| {
            let kind = descriptor.kind;
            let ctx = Arc::clone(&ctx);
            let handle = tokio::spawn(async move {
                let start = Instant::now();
                let result = run_pipeline(&ctx, &descriptor).await;
                (result, start.elapsed())
            });
            (kind, handle)
        })
        .collect();

    let mut reports = Vec::with_capacity(handles.len());
    for (kind, handle) in handles {
        let (outcome, duration) = match handle.await {
            Ok((Ok(summary), duration)) => {
                ctx.logger.log_pipeline_succeeded(
                    kind,
                    summary.rows_appended(),
                    duration.as_secs_f64(),
                );
                (PipelineOutcome::Succeeded(summary), duration)
            }
            Ok((Err(error), duration)) => {
                ctx.logger.log_pipeline_failed(kind, &error);
                (PipelineOutcome::Failed(error), duration)
            }
            Err(join_error) => {
                let reason = join_error.to_string();
                ctx.logger.log_pipeline_lost(kind, &reason);
                (PipelineOutcome::Aborted(reason), started.elapsed())
            }
        };

        ctx.metrics
            .record_pipeline(kind, outcome.label(), duration.as_secs_f64());
        reports.push(PipelineReport {
            kind,
            outcome,
            duration,
        });
    }

    let succeeded = reports.iter().filter(|r| r.outcome.is_success()).count();
    ctx.logger
        .log_run_finished(succeeded, reports.len() - succeeded);

    reports
}
