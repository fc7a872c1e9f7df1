use anyhow::{Context, Result};
use catalog_protocol::{CatalogRecord, Filter, RecordKind, ALL_KINDS};
use catalog_store::{CatalogStore, InMemoryStore, PageRequest, Principal};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Local catalog snapshot: the file-backed store used for dev runs and
/// tests. Remote transports live behind [`CatalogStore`] and are wired in
/// by their own deployments.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Snapshot {
    #[serde(default)]
    pub records: Vec<CatalogRecord>,
    #[serde(default)]
    pub principals: Vec<Principal>,
}

impl Snapshot {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading snapshot {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("parsing snapshot {}", path.display()))
    }

    pub fn into_store(self) -> InMemoryStore {
        let store = InMemoryStore::new();
        for record in self.records {
            store.seed(record);
        }
        store
    }

    /// Re-export the store's current contents, preserving principals.
    pub async fn from_store(store: &InMemoryStore, principals: Vec<Principal>) -> Result<Self> {
        let mut records = Vec::new();
        for kind in ALL_KINDS {
            records.extend(collect_kind(store, kind).await?);
        }
        Ok(Self {
            records,
            principals,
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)
            .with_context(|| format!("writing snapshot {}", path.display()))?;
        Ok(())
    }
}

async fn collect_kind(store: &InMemoryStore, kind: RecordKind) -> Result<Vec<CatalogRecord>> {
    let mut out = Vec::new();
    let mut cursor = None;
    loop {
        let page = store
            .list(
                kind,
                &Filter::All,
                PageRequest {
                    cursor,
                    limit: 200,
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

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_protocol::{FieldValue, RecordId};
    use pretty_assertions::assert_eq;

    fn sample() -> Snapshot {
        let mut product = CatalogRecord::new(RecordId::from("p1"), RecordKind::Product, 1);
        product.set_field("name", FieldValue::text("Café"));
        product.set_field("slug", FieldValue::Null);
        Snapshot {
            records: vec![product],
            principals: vec![Principal {
                id: "auth-1".to_string(),
                email: "ada@example.com".to_string(),
            }],
        }
    }

    #[tokio::test]
    async fn round_trips_through_disk_and_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        sample().save(&path).unwrap();

        let loaded = Snapshot::load(&path).unwrap();
        assert_eq!(loaded.records.len(), 1);
        assert_eq!(loaded.principals.len(), 1);

        let store = loaded.into_store();
        let out = Snapshot::from_store(&store, Vec::new()).await.unwrap();
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].id, RecordId::from("p1"));
    }

    #[test]
    fn missing_file_is_a_clear_error() {
        let err = Snapshot::load(Path::new("/nonexistent/catalog.json")).unwrap_err();
        assert!(err.to_string().contains("catalog.json"));
    }
}
