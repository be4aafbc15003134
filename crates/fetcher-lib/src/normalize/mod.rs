//! Record normalization
//!
//! Reshapes a decoded allocation response into flat rows matching a kind's
//! dataset layout. A single malformed item fails the whole response so a
//! dataset never receives a partial run.

mod extract;
mod rollout;
mod schema;


pub use extract::{extract_row, format_value, ExtractedRow, PLACEHOLDER_CLUSTER};
pub use rollout::{rollout_name, ROLLOUT_PREFIX};
pub use schema::{dataset_key, IdentitySource, KindDescriptor, ROLLOUT_DATASET};

use crate::allocation::AllocationResponse;
use crate::error::PipelineError;
use crate::models::NormalizedRows;
use tracing::debug;

/// Normalize every item of `response` according to `descriptor`
pub fn normalize(
    response: &AllocationResponse,
    descriptor: &KindDescriptor,
    cluster_name: &str,
) -> Result<NormalizedRows, PipelineError> {
    let kind = descriptor.kind;
    let mut rows = NormalizedRows::default();

    for (index, bucket) in response.buckets.iter().enumerate() {
        let Some(items) = bucket else {
            debug!(kind = %kind, bucket = index, "No data in allocation bucket");
            continue;
        };

        for (key, value) in items {
            let extracted = extract_row(key, value, descriptor, cluster_name).map_err(|source| {
                PipelineError::MalformedRecord {
                    kind,
                    item: key.clone(),
                    source,
                }
            })?;

            let Some(ExtractedRow { name, row }) = extracted else {
                continue;
            };

            if descriptor.rollout {
                if let Some(rollout) = rollout_name(&name) {
                    let mut rollout_row = row.clone();
                    rollout_row[0] = rollout;
                    rows.rollout.push(rollout_row);
                }
            }

            rows.primary.push(row);
        }
    }

    Ok(rows)
}
