use crate::error::Result;
use crate::store::{CatalogStore, Page, PageRequest};
use catalog_protocol::{Filter, RecordKind};
use std::sync::Arc;
use std::time::Duration;

/// Bounded exponential backoff for page-level retries.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), doubling each time.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Paged reader over the store, absorbing transient fetch failures.
///
/// A page fetch that keeps failing after the configured retries surfaces
/// the underlying error to the caller; the runner treats that as fatal
/// for the whole run.
pub struct RecordSource {
    store: Arc<dyn CatalogStore>,
    policy: RetryPolicy,
    page_size: usize,
    request_timeout: Duration,
}

impl RecordSource {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        policy: RetryPolicy,
        page_size: usize,
        request_timeout: Duration,
    ) -> Self {
        Self {
            store,
            policy,
            page_size,
            request_timeout,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub async fn fetch_page(
        &self,
        kind: RecordKind,
        filter: &Filter,
        cursor: Option<String>,
    ) -> Result<Page> {
        let mut attempt = 0u32;
        loop {
            let request = PageRequest {
                cursor: cursor.clone(),
                limit: self.page_size,
            };
            let fetch = self.store.list(kind, filter, request);
            let result = match tokio::time::timeout(self.request_timeout, fetch).await {
                Ok(result) => result,
                // A fetch timeout is just another transient transport error.
                Err(_) => Err(crate::error::StoreError::transient(format!(
                    "page fetch timed out after {:?}",
                    self.request_timeout
                ))),
            };
            match result {
                Ok(page) => return Ok(page),
                Err(err) if err.is_retryable() && attempt + 1 < self.policy.max_attempts => {
                    attempt += 1;
                    let delay = self.policy.delay_for(attempt);
                    log::warn!(
                        "page fetch for {kind} failed (attempt {attempt}): {err}; retrying in {delay:?}"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    log::error!("page fetch for {kind} failed permanently: {err}");
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{FaultPlan, InMemoryStore};
    use catalog_protocol::{CatalogRecord, RecordId, RecordKind};
    use pretty_assertions::assert_eq;

    fn seeded_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        for i in 0..5 {
            let id = format!("p{i}");
            store.seed(CatalogRecord::new(
                RecordId::from(id),
                RecordKind::Product,
                1,
            ));
        }
        store
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_list_failures() {
        let store = seeded_store();
        store.inject(FaultPlan::transient_lists(2));
        let source = RecordSource::new(
            Arc::new(store),
            RetryPolicy::default(),
            10,
            Duration::from_secs(5),
        );

        let page = source
            .fetch_page(RecordKind::Product, &Filter::All, None)
            .await
            .expect("recovers after retries");
        assert_eq!(page.records.len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_exhaustion() {
        let store = seeded_store();
        store.inject(FaultPlan::transient_lists(10));
        let source = RecordSource::new(
            Arc::new(store),
            RetryPolicy::default(),
            10,
            Duration::from_secs(5),
        );

        let err = source
            .fetch_page(RecordKind::Product, &Filter::All, None)
            .await
            .expect_err("exhausts retries");
        assert!(err.is_retryable());
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
    }
}
