use catalog_protocol::{RecordId, RecordKind};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug, Clone)]
pub enum StoreError {
    /// Transport or auth failure reaching the store. Retryable at page
    /// granularity; fatal for the run once retries are exhausted.
    #[error("source unavailable: {detail}")]
    SourceUnavailable { detail: String },

    /// Optimistic-version mismatch on a conditional write.
    #[error("version conflict on {kind} {id}: expected {expected}, found {actual}")]
    Conflict {
        kind: RecordKind,
        id: RecordId,
        expected: u64,
        actual: u64,
    },

    /// Timeout or 5xx-equivalent on a single operation.
    #[error("transient store error: {detail}")]
    Transient { detail: String },

    #[error("{kind} {id} not found")]
    NotFound { kind: RecordKind, id: RecordId },

    #[error("invalid store request: {detail}")]
    Invalid { detail: String },
}

impl StoreError {
    pub fn source_unavailable(detail: impl Into<String>) -> Self {
        StoreError::SourceUnavailable {
            detail: detail.into(),
        }
    }

    pub fn transient(detail: impl Into<String>) -> Self {
        StoreError::Transient {
            detail: detail.into(),
        }
    }

    /// Whether a caller may retry the same operation with backoff.
    /// Conflicts are deliberately not retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::SourceUnavailable { .. } | StoreError::Transient { .. }
        )
    }
}
