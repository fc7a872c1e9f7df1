use crate::error::{Result, StoreError};
use crate::principal::{Principal, PrincipalDirectory};
use crate::store::{CatalogStore, Page, PageRequest, DEFAULT_PAGE_SIZE};
use async_trait::async_trait;
use catalog_protocol::{CatalogRecord, FieldValue, Filter, RecordId, RecordKind};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex as StdMutex;
use tokio::sync::RwLock;

/// Failures to inject ahead of real operations, for exercising retry and
/// abort paths in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct FaultPlan {
    pub transient_lists: u32,
    pub unavailable_lists: u32,
    pub transient_updates: u32,
}

impl FaultPlan {
    pub fn transient_lists(count: u32) -> Self {
        Self {
            transient_lists: count,
            ..Self::default()
        }
    }

    pub fn unavailable_lists(count: u32) -> Self {
        Self {
            unavailable_lists: count,
            ..Self::default()
        }
    }

    pub fn transient_updates(count: u32) -> Self {
        Self {
            transient_updates: count,
            ..Self::default()
        }
    }
}

/// Reference [`CatalogStore`] used across the workspace's tests.
///
/// Honors optimistic versions, evaluates filters with the protocol's
/// reference semantics, and paginates by record id. Not a production
/// backend.
pub struct InMemoryStore {
    tables: RwLock<HashMap<RecordKind, BTreeMap<RecordId, CatalogRecord>>>,
    faults: StdMutex<FaultPlan>,
    writes: AtomicU64,
    next_id: AtomicU64,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            faults: StdMutex::new(FaultPlan::default()),
            writes: AtomicU64::new(0),
            next_id: AtomicU64::new(1),
        }
    }

    /// Insert or replace a record verbatim, without counting as a write.
    /// Only valid while nothing else holds the store.
    pub fn seed(&self, record: CatalogRecord) {
        let mut tables = self.tables.try_write().expect("seed on an idle store");
        tables
            .entry(record.kind)
            .or_default()
            .insert(record.id.clone(), record);
    }

    pub fn inject(&self, plan: FaultPlan) {
        *self.faults.lock().expect("fault plan lock") = plan;
    }

    /// Number of writes (updates + inserts) performed so far. The
    /// idempotence tests key off this.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Snapshot one record, panicking when absent (test helper).
    pub async fn snapshot(&self, kind: RecordKind, id: &RecordId) -> CatalogRecord {
        let tables = self.tables.read().await;
        tables
            .get(&kind)
            .and_then(|t| t.get(id))
            .cloned()
            .unwrap_or_else(|| panic!("no {kind} record {id}"))
    }

    fn take_list_fault(&self) -> Option<StoreError> {
        let mut plan = self.faults.lock().expect("fault plan lock");
        if plan.unavailable_lists > 0 {
            plan.unavailable_lists -= 1;
            return Some(StoreError::source_unavailable("injected outage"));
        }
        if plan.transient_lists > 0 {
            plan.transient_lists -= 1;
            return Some(StoreError::transient("injected list failure"));
        }
        None
    }

    fn take_update_fault(&self) -> Option<StoreError> {
        let mut plan = self.faults.lock().expect("fault plan lock");
        if plan.transient_updates > 0 {
            plan.transient_updates -= 1;
            return Some(StoreError::transient("injected write failure"));
        }
        None
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn list(&self, kind: RecordKind, filter: &Filter, page: PageRequest) -> Result<Page> {
        if let Some(err) = self.take_list_fault() {
            return Err(err);
        }
        let limit = if page.limit == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            page.limit
        };
        let tables = self.tables.read().await;
        let Some(table) = tables.get(&kind) else {
            return Ok(Page {
                records: Vec::new(),
                next_cursor: None,
            });
        };

        let lower = match &page.cursor {
            Some(cursor) => Bound::Excluded(RecordId::from(cursor.clone())),
            None => Bound::Unbounded,
        };
        let mut records: Vec<CatalogRecord> = Vec::new();
        let mut next_cursor = None;
        for (_, record) in table.range((lower, Bound::Unbounded)) {
            if !filter.matches_record(record) {
                continue;
            }
            if records.len() == limit {
                // One more match exists past the page boundary.
                next_cursor = records.last().map(|r| r.id.to_string());
                break;
            }
            records.push(record.clone());
        }
        Ok(Page {
            records,
            next_cursor,
        })
    }

    async fn get(&self, kind: RecordKind, id: &RecordId) -> Result<CatalogRecord> {
        let tables = self.tables.read().await;
        tables
            .get(&kind)
            .and_then(|t| t.get(id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind,
                id: id.clone(),
            })
    }

    async fn update_fields(
        &self,
        kind: RecordKind,
        id: &RecordId,
        fields: &BTreeMap<String, FieldValue>,
        expected_version: u64,
    ) -> Result<()> {
        if let Some(err) = self.take_update_fault() {
            return Err(err);
        }
        if fields.is_empty() {
            return Err(StoreError::Invalid {
                detail: "update with no fields".to_string(),
            });
        }
        let mut tables = self.tables.write().await;
        let record = tables
            .get_mut(&kind)
            .and_then(|t| t.get_mut(id))
            .ok_or_else(|| StoreError::NotFound {
                kind,
                id: id.clone(),
            })?;
        if record.version != expected_version {
            return Err(StoreError::Conflict {
                kind,
                id: id.clone(),
                expected: expected_version,
                actual: record.version,
            });
        }
        for (name, value) in fields {
            record.set_field(name.clone(), value.clone());
        }
        record.version += 1;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn insert(
        &self,
        kind: RecordKind,
        fields: BTreeMap<String, FieldValue>,
    ) -> Result<RecordId> {
        let serial = self.next_id.fetch_add(1, Ordering::SeqCst);
        let id = RecordId::from(format!("{}-{serial}", kind.as_str()));
        let mut record = CatalogRecord::new(id.clone(), kind, 1);
        record.fields = fields;
        let mut tables = self.tables.write().await;
        tables.entry(kind).or_default().insert(id.clone(), record);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }
}

/// Fixed in-memory principal directory for tests and local runs.
#[derive(Debug, Default)]
pub struct InMemoryPrincipals {
    principals: Vec<Principal>,
}

impl InMemoryPrincipals {
    pub fn new(principals: Vec<Principal>) -> Self {
        Self { principals }
    }
}

#[async_trait]
impl PrincipalDirectory for InMemoryPrincipals {
    async fn find_principal_by_email(&self, email: &str) -> Result<Option<Principal>> {
        let needle = email.trim().to_ascii_lowercase();
        Ok(self
            .principals
            .iter()
            .find(|p| p.email.eq_ignore_ascii_case(&needle))
            .cloned())
    }
}
