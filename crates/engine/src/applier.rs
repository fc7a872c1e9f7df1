use catalog_protocol::{
    ApplyOutcome, CatalogRecord, FailureKind, FieldValue, Patch, RunMode,
};
use catalog_rules::{RuleError, UniquenessResolver};
use catalog_store::{CatalogStore, RetryPolicy, StoreError, Throttle};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Applies one patch to the store: field-level conditional writes only,
/// bounded retries for transient failures, no retry for conflicts.
pub struct PatchApplier {
    store: Arc<dyn CatalogStore>,
    throttle: Arc<Throttle>,
    retry: RetryPolicy,
    request_timeout: Duration,
    max_suffix_attempts: u32,
}

impl PatchApplier {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        throttle: Arc<Throttle>,
        retry: RetryPolicy,
        request_timeout: Duration,
        max_suffix_attempts: u32,
    ) -> Self {
        Self {
            store,
            throttle,
            retry,
            request_timeout,
            max_suffix_attempts,
        }
    }

    pub async fn apply(
        &self,
        record: &CatalogRecord,
        patch: &Patch,
        mode: RunMode,
    ) -> ApplyOutcome {
        if !mode.is_commit() {
            log::info!(
                "[dry-run] {} {} would change {:?} ({})",
                record.kind,
                record.id,
                patch.changes.keys().collect::<Vec<_>>(),
                patch.reason
            );
            return ApplyOutcome::SkippedDryRun;
        }

        match self
            .write(record, &patch.changes, record.version)
            .await
        {
            Ok(()) => {}
            Err(outcome) => return outcome,
        }
        log::info!(
            "{} {} patched by `{}`: {}",
            record.kind,
            record.id,
            patch.rule,
            patch.reason
        );

        // The store, not the resolver, is the uniqueness source of truth;
        // a concurrent run may have claimed the same value between
        // resolution and write. Verify and re-resolve until stable.
        let written_version = record.version + 1;
        for field in &patch.unique_fields {
            let Some(FieldValue::Text(value)) = patch.changes.get(field) else {
                continue;
            };
            match self
                .reverify_unique(record, field, value, written_version)
                .await
            {
                Ok(()) => {}
                Err(outcome) => return outcome,
            }
        }
        ApplyOutcome::Applied
    }

    /// Post-write uniqueness check. A rewritten value can itself lose a
    /// race to a concurrent run, so the verify/re-resolve cycle repeats
    /// until no other record holds the value, bounded by the suffix cap.
    async fn reverify_unique(
        &self,
        record: &CatalogRecord,
        field: &str,
        value: &str,
        written_version: u64,
    ) -> Result<(), ApplyOutcome> {
        let resolver = UniquenessResolver::new(self.store.clone(), self.max_suffix_attempts);
        let mut current = value.to_string();
        let mut version = written_version;
        for _ in 0..self.max_suffix_attempts {
            let taken = resolver
                .is_taken(record.kind, field, &current, &record.id)
                .await
                .map_err(|err| rule_failure(&record.id, err))?;
            if !taken {
                return Ok(());
            }
            log::warn!(
                "{} {} lost a uniqueness race on {field}={current}; re-resolving",
                record.kind,
                record.id
            );
            let fresh = resolver
                .resolve(record.kind, field, value, &record.id)
                .await
                .map_err(|err| rule_failure(&record.id, err))?;
            let mut fields = BTreeMap::new();
            fields.insert(field.to_string(), FieldValue::text(fresh.as_str()));
            self.write(record, &fields, version).await?;
            version += 1;
            current = fresh;
        }
        Err(rule_failure(
            &record.id,
            RuleError::UniquenessExhausted {
                kind: record.kind,
                field: field.to_string(),
                candidate: current,
                attempts: self.max_suffix_attempts,
            },
        ))
    }

    /// One conditional write with throttling, per-request timeout, and
    /// bounded backoff for transient failures.
    async fn write(
        &self,
        record: &CatalogRecord,
        fields: &BTreeMap<String, FieldValue>,
        expected_version: u64,
    ) -> Result<(), ApplyOutcome> {
        let mut attempt = 0u32;
        loop {
            self.throttle.acquire().await;
            let write = self
                .store
                .update_fields(record.kind, &record.id, fields, expected_version);
            let result = match tokio::time::timeout(self.request_timeout, write).await {
                Ok(result) => result,
                Err(_) => Err(StoreError::transient(format!(
                    "write timed out after {:?}",
                    self.request_timeout
                ))),
            };
            match result {
                Ok(()) => return Ok(()),
                Err(err @ StoreError::Conflict { .. }) => {
                    // The record changed meaningfully since read; the next
                    // run re-evaluates it from fresh state.
                    log::warn!("{} {} write conflict: {err}", record.kind, record.id);
                    return Err(ApplyOutcome::Failed {
                        kind: FailureKind::Conflict,
                        detail: err.to_string(),
                    });
                }
                Err(StoreError::NotFound { kind, id }) => {
                    return Err(ApplyOutcome::Failed {
                        kind: FailureKind::Conflict,
                        detail: format!("{kind} {id} disappeared between read and write"),
                    });
                }
                Err(err) if err.is_retryable() && attempt + 1 < self.retry.max_attempts => {
                    attempt += 1;
                    let delay = self.retry.delay_for(attempt);
                    log::warn!(
                        "{} {} write failed (attempt {attempt}): {err}; retrying in {delay:?}",
                        record.kind,
                        record.id
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    log::error!(
                        "{} {} write failed permanently: {err}",
                        record.kind,
                        record.id
                    );
                    return Err(ApplyOutcome::Failed {
                        kind: FailureKind::Transient,
                        detail: err.to_string(),
                    });
                }
            }
        }
    }
}

fn rule_failure(id: &catalog_protocol::RecordId, err: RuleError) -> ApplyOutcome {
    let kind = match &err {
        RuleError::UniquenessExhausted { .. } => FailureKind::UniquenessExhausted,
        RuleError::Store(_) => FailureKind::Transient,
    };
    log::error!("post-write verification failed for {id}: {err}");
    ApplyOutcome::Failed {
        kind,
        detail: err.to_string(),
    }
}
