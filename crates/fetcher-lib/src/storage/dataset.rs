//! Append-only CSV datasets
//!
//! A dataset is one CSV object: a single header row followed by every row
//! ever appended, in arrival order. Each merge reads the whole object,
//! appends in memory and writes the whole object back in one put, so a
//! failed write leaves the previous version intact.

use super::ObjectStore;
use crate::error::{PipelineError, StorageError};
use crate::models::Row;
use std::sync::Arc;
use tracing::{debug, warn};

pub const CSV_CONTENT_TYPE: &str = "text/csv";

/// Result of one read-merge-write cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub key: String,
    /// The object did not exist (or was empty) and a header was written
    pub created: bool,
    /// Data rows present before the merge
    pub existing_rows: usize,
    /// Data rows appended by the merge
    pub appended: usize,
    /// Exact bytes of the merged dataset
    pub body: Vec<u8>,
}

impl MergeOutcome {
    /// Data rows in the dataset after the merge, header excluded
    pub fn total_rows(&self) -> usize {
        self.existing_rows + self.appended
    }
}

/// Merge engine over an [`ObjectStore`]
#[derive(Clone)]
pub struct DatasetStore {
    store: Arc<dyn ObjectStore>,
}

impl DatasetStore {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Load every record of the dataset under `key`, header included.
    ///
    /// Returns `None` when the object does not exist yet.
    pub async fn load(&self, key: &str) -> Result<Option<Vec<Row>>, PipelineError> {
        let exists = self
            .store
            .exists(key)
            .await
            .map_err(|source| persist_error(key, source))?;

        if !exists {
            return Ok(None);
        }

        let body = match self.store.get(key).await {
            Ok(body) => body,
            // removed between probe and read; nothing to preserve
            Err(StorageError::NotFound(_)) => return Ok(None),
            Err(source) => return Err(persist_error(key, source)),
        };

        parse_records(key, &body).map(Some)
    }

    /// Append `new_rows` to the dataset under `key` and write it back.
    ///
    /// The header is written only when the dataset is created. Existing rows
    /// are preserved exactly and `new_rows` follow them in the given order.
    pub async fn merge_and_persist(
        &self,
        key: &str,
        header: &[String],
        new_rows: &[Row],
    ) -> Result<MergeOutcome, PipelineError> {
        let outcome = self.prepare(key, header, new_rows).await?;
        self.commit(&outcome).await?;
        Ok(outcome)
    }

    /// Load the dataset under `key` and build its merged body without writing.
    ///
    /// Every load-stage failure surfaces here, so callers writing several
    /// datasets can validate all of them before the first put.
    pub async fn prepare(
        &self,
        key: &str,
        header: &[String],
        new_rows: &[Row],
    ) -> Result<MergeOutcome, PipelineError> {
        let existing = match self.load(key).await? {
            Some(records) if records.is_empty() => {
                warn!(key = %key, "Existing dataset is empty, rewriting header");
                None
            }
            other => other,
        };

        let created = existing.is_none();
        let mut records = match existing {
            Some(records) => {
                let width = records[0].len();
                if width != header.len() {
                    return Err(PipelineError::CorruptDataset {
                        key: key.to_string(),
                        reason: format!(
                            "existing header has {} columns, expected {}",
                            width,
                            header.len()
                        ),
                    });
                }
                records
            }
            None => vec![header.to_vec()],
        };

        let existing_rows = records.len() - 1;
        records.extend(new_rows.iter().cloned());

        let body = serialize_records(&records).map_err(|e| {
            persist_error(key, StorageError::Backend(format!("serializing CSV: {}", e)))
        })?;

        Ok(MergeOutcome {
            key: key.to_string(),
            created,
            existing_rows,
            appended: new_rows.len(),
            body,
        })
    }

    /// Write a prepared merge in a single put
    pub async fn commit(&self, outcome: &MergeOutcome) -> Result<(), PipelineError> {
        self.store
            .put(&outcome.key, outcome.body.clone(), CSV_CONTENT_TYPE)
            .await
            .map_err(|source| persist_error(&outcome.key, source))?;

        debug!(
            key = %outcome.key,
            created = outcome.created,
            existing_rows = outcome.existing_rows,
            appended = outcome.appended,
            bytes = outcome.body.len(),
            "Dataset written"
        );

        Ok(())
    }
}

fn persist_error(key: &str, source: StorageError) -> PipelineError {
    PipelineError::Persist {
        key: key.to_string(),
        source,
    }
}

/// Parse a CSV body into records. Every record must have the same width.
pub(crate) fn parse_records(key: &str, body: &[u8]) -> Result<Vec<Row>, PipelineError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(body);

    reader
        .records()
        .map(|record| {
            record
                .map(|record| record.iter().map(String::from).collect())
                .map_err(|e| PipelineError::CorruptDataset {
                    key: key.to_string(),
                    reason: e.to_string(),
                })
        })
        .collect()
}

/// Serialize records as comma-delimited, `\n`-terminated CSV.
///
/// Fields are quoted only when they contain a delimiter, a quote or a line
/// break. A leading space alone does not trigger quoting, so a dataset whose
/// writer quoted such fields is rewritten with them unquoted on the next
/// merge. The field values are unchanged.
pub(crate) fn serialize_records(records: &[Row]) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    for record in records {
        writer.write_record(record)?;
    }

    writer.into_inner().map_err(|e| e.into_error().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fields: &[&str]) -> Row {
        fields.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn test_serialize_quotes_only_when_needed() {
        let records = vec![
            row(&["Deployment", "Namespace"]),
            row(&["web, canary", "apps"]),
            row(&["say \"hi\"", ""]),
        ];

        let body = serialize_records(&records).unwrap();
        assert_eq!(
            String::from_utf8(body).unwrap(),
            "Deployment,Namespace\n\"web, canary\",apps\n\"say \"\"hi\"\"\",\n"
        );
    }

    #[test]
    fn test_parse_round_trips_serialized_records() {
        let records = vec![row(&["a", "b"]), row(&["x,y", "line\nbreak"])];
        let body = serialize_records(&records).unwrap();

        assert_eq!(parse_records("k", &body).unwrap(), records);
    }

    #[test]
    fn test_parse_accepts_crlf() {
        let records = parse_records("k", b"a,b\r\n1,2\r\n").unwrap();
        assert_eq!(records, vec![row(&["a", "b"]), row(&["1", "2"])]);
    }

    #[test]
    fn test_parse_rejects_ragged_rows() {
        let err = parse_records("Pod/Pod.csv", b"a,b\n1,2,3\n").unwrap_err();
        assert_eq!(err.stage(), "load");
        assert!(err.to_string().contains("Pod/Pod.csv"));
    }
}
