use crate::{Result, RuleError};
use catalog_protocol::{FieldValue, Filter, RecordId, RecordKind};
use catalog_store::{CatalogStore, PageRequest};
use std::sync::Arc;

/// Resolves store-wide-unique values (slugs, SKUs) by probing the store
/// and appending `-2`, `-3`, … deterministically.
///
/// The store, not this resolver, is the source of truth for collisions,
/// so two concurrent runs can still race to the same final value; the
/// applier's post-write verification closes that window.
pub struct UniquenessResolver {
    store: Arc<dyn CatalogStore>,
    max_attempts: u32,
}

impl UniquenessResolver {
    pub fn new(store: Arc<dyn CatalogStore>, max_attempts: u32) -> Self {
        Self {
            store,
            max_attempts: max_attempts.max(1),
        }
    }

    pub async fn resolve(
        &self,
        kind: RecordKind,
        field: &str,
        candidate: &str,
        exclude_id: &RecordId,
    ) -> Result<String> {
        if !self.is_taken(kind, field, candidate, exclude_id).await? {
            return Ok(candidate.to_string());
        }
        for n in 2..=(self.max_attempts as u64 + 1) {
            let suffixed = format!("{candidate}-{n}");
            if !self.is_taken(kind, field, &suffixed, exclude_id).await? {
                return Ok(suffixed);
            }
        }
        Err(RuleError::UniquenessExhausted {
            kind,
            field: field.to_string(),
            candidate: candidate.to_string(),
            attempts: self.max_attempts,
        })
    }

    /// Whether any *other* record of `kind` already holds `value`.
    pub async fn is_taken(
        &self,
        kind: RecordKind,
        field: &str,
        value: &str,
        exclude_id: &RecordId,
    ) -> Result<bool> {
        let filter = Filter::equals(field, FieldValue::text(value));
        let page = self
            .store
            .list(kind, &filter, PageRequest::first(2))
            .await?;
        Ok(page.records.iter().any(|r| &r.id != exclude_id))
    }
}
