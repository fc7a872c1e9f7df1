use crate::settings::RuleSettings;
use crate::uniqueness::UniquenessResolver;
use crate::Result;
use catalog_protocol::{CatalogRecord, Filter, RecordKind};
use catalog_store::{CatalogStore, PageRequest, PrincipalDirectory};
use std::sync::Arc;

/// Collaborators injected into rules: read access to the store, the
/// principal directory, and the operator settings. Rules never write.
pub struct RuleContext {
    store: Arc<dyn CatalogStore>,
    principals: Arc<dyn PrincipalDirectory>,
    settings: Arc<RuleSettings>,
}

impl RuleContext {
    pub fn new(
        store: Arc<dyn CatalogStore>,
        principals: Arc<dyn PrincipalDirectory>,
        settings: Arc<RuleSettings>,
    ) -> Self {
        Self {
            store,
            principals,
            settings,
        }
    }

    pub fn settings(&self) -> &RuleSettings {
        &self.settings
    }

    /// Read-only store handle for point lookups (reference checks).
    pub fn store(&self) -> &dyn CatalogStore {
        self.store.as_ref()
    }

    pub fn principals(&self) -> &dyn PrincipalDirectory {
        self.principals.as_ref()
    }

    pub fn uniqueness(&self) -> UniquenessResolver {
        UniquenessResolver::new(self.store.clone(), self.settings.max_suffix_attempts)
    }

    /// Drain every record of `kind` matching `filter` through pagination.
    /// Intended for narrow lookups (e.g. a product's variants), not kind
    /// scans — the runner owns those.
    pub async fn collect(&self, kind: RecordKind, filter: &Filter) -> Result<Vec<CatalogRecord>> {
        let mut out = Vec::new();
        let mut cursor = None;
        loop {
            let page = self
                .store
                .list(
                    kind,
                    filter,
                    PageRequest {
                        cursor,
                        limit: catalog_store::DEFAULT_PAGE_SIZE,
                    },
                )
                .await?;
            out.extend(page.records);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => return Ok(out),
            }
        }
    }
}
