use crate::error::Result;
use async_trait::async_trait;
use catalog_protocol::{CatalogRecord, FieldValue, Filter, RecordId, RecordKind};
use std::collections::BTreeMap;

pub const DEFAULT_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Default)]
pub struct PageRequest {
    pub cursor: Option<String>,
    pub limit: usize,
}

impl PageRequest {
    pub fn first(limit: usize) -> Self {
        Self {
            cursor: None,
            limit,
        }
    }

    pub fn after(cursor: impl Into<String>, limit: usize) -> Self {
        Self {
            cursor: Some(cursor.into()),
            limit,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Page {
    pub records: Vec<CatalogRecord>,
    pub next_cursor: Option<String>,
}

/// The entire surface the engine is allowed to touch on the remote store.
///
/// No raw query-language statements: filters are the declarative predicate
/// set from the protocol crate, and writes are field-level and conditional
/// on the version observed at read time.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn list(&self, kind: RecordKind, filter: &Filter, page: PageRequest) -> Result<Page>;

    async fn get(&self, kind: RecordKind, id: &RecordId) -> Result<CatalogRecord>;

    /// Write only the named fields, iff the record's current version equals
    /// `expected_version`. The store bumps the version on success.
    async fn update_fields(
        &self,
        kind: RecordKind,
        id: &RecordId,
        fields: &BTreeMap<String, FieldValue>,
        expected_version: u64,
    ) -> Result<()>;

    async fn insert(&self, kind: RecordKind, fields: BTreeMap<String, FieldValue>)
        -> Result<RecordId>;
}
