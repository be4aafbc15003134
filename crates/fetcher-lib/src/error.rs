//! Error types for the extraction pipeline

use crate::models::AggregateKind;

/// Failure of a single field lookup inside an allocation item
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    #[error("missing field `{0}`")]
    Missing(String),

    #[error("field `{field}` is not {expected}")]
    WrongType {
        field: String,
        expected: &'static str,
    },
}

/// Allocation response body whose envelope cannot be decoded
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EnvelopeError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    #[error("missing field `data`")]
    MissingData,

    #[error("field `data` must be an array, got {0}")]
    DataNotArray(&'static str),

    #[error("data[{index}] must be an object or null, got {found}")]
    BadBucket { index: usize, found: &'static str },
}

/// Failure reported by an object storage backend
#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("object {0} not found")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Terminal failure of one resource-kind pipeline
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("fetching {kind} allocations failed after {attempts} attempts: {source}")]
    Fetch {
        kind: AggregateKind,
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error("decoding {kind} allocation response failed: {reason}")]
    Decode { kind: AggregateKind, reason: String },

    #[error("{kind} item {item:?} is malformed: {source}")]
    MalformedRecord {
        kind: AggregateKind,
        item: String,
        #[source]
        source: FieldError,
    },

    #[error("existing dataset {key} is corrupt: {reason}")]
    CorruptDataset { key: String, reason: String },

    #[error("persisting dataset {key} failed: {source}")]
    Persist {
        key: String,
        #[source]
        source: StorageError,
    },
}

impl PipelineError {
    /// Pipeline stage that produced the error
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Fetch { .. } => "fetch",
            PipelineError::Decode { .. } => "decode",
            PipelineError::MalformedRecord { .. } => "normalize",
            PipelineError::CorruptDataset { .. } => "load",
            PipelineError::Persist { .. } => "persist",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_record_message_includes_path() {
        let err = PipelineError::MalformedRecord {
            kind: AggregateKind::Pod,
            item: "web-0".to_string(),
            source: FieldError::WrongType {
                field: "cpuCost".to_string(),
                expected: "a number",
            },
        };

        assert_eq!(err.stage(), "normalize");
        assert_eq!(
            err.to_string(),
            "pod item \"web-0\" is malformed: field `cpuCost` is not a number"
        );
    }

    #[test]
    fn test_stage_names() {
        let corrupt = PipelineError::CorruptDataset {
            key: "Node/Node.csv".to_string(),
            reason: "bad quote".to_string(),
        };
        let persist = PipelineError::Persist {
            key: "Node/Node.csv".to_string(),
            source: StorageError::Backend("access denied".to_string()),
        };

        assert_eq!(corrupt.stage(), "load");
        assert_eq!(persist.stage(), "persist");
    }
}
