use crate::slugify::slugify;
use crate::{InvariantRule, Result, RuleContext};
use catalog_protocol::{CatalogRecord, FieldValue, Patch, RecordKind, RuleVerdict, SLUG_PATTERN};
use once_cell::sync::Lazy;
use regex::Regex;

pub const RULE_NAME: &str = "slug";

static SLUG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(SLUG_PATTERN).expect("valid slug pattern"));

/// Derives a slug from the display name when the stored one is null,
/// empty, or malformed, delegating collisions to the uniqueness resolver.
pub struct SlugRule;

impl SlugRule {
    fn slug_is_valid(slug: Option<&str>) -> bool {
        slug.is_some_and(|s| SLUG_RE.is_match(s))
    }
}

#[async_trait::async_trait]
impl InvariantRule for SlugRule {
    fn name(&self) -> &'static str {
        RULE_NAME
    }

    fn applies_to(&self, kind: RecordKind) -> bool {
        matches!(kind, RecordKind::Product | RecordKind::Category)
    }

    fn applies(&self, record: &CatalogRecord) -> bool {
        !Self::slug_is_valid(record.text("slug"))
    }

    async fn evaluate(&self, record: &CatalogRecord, ctx: &RuleContext) -> Result<RuleVerdict> {
        if Self::slug_is_valid(record.text("slug")) {
            return Ok(RuleVerdict::Compliant);
        }
        let Some(name) = record.text("name").filter(|n| !n.trim().is_empty()) else {
            return Ok(RuleVerdict::ManualReview {
                rule: RULE_NAME.to_string(),
                reason: "no name to derive a slug from".to_string(),
            });
        };
        let candidate = slugify(name);
        if candidate.is_empty() {
            return Ok(RuleVerdict::ManualReview {
                rule: RULE_NAME.to_string(),
                reason: format!("name `{name}` yields an empty slug"),
            });
        }
        let resolved = ctx
            .uniqueness()
            .resolve(record.kind, "slug", &candidate, &record.id)
            .await?;

        let patch = Patch::builder(RULE_NAME, record)
            .reason(format!("derived slug from name `{name}`"))
            .set("slug", FieldValue::text(resolved))
            .unique("slug")
            .build();
        match patch {
            Some(patch) => Ok(RuleVerdict::Patch(patch)),
            None => Ok(RuleVerdict::Compliant),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::RuleSettings;
    use catalog_protocol::RecordId;
    use catalog_store::{InMemoryPrincipals, InMemoryStore};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn product(id: &str, name: &str, slug: Option<&str>) -> CatalogRecord {
        let mut rec = CatalogRecord::new(RecordId::from(id), RecordKind::Product, 1);
        rec.set_field("name", FieldValue::text(name));
        rec.set_field("slug", slug.map_or(FieldValue::Null, FieldValue::text));
        rec
    }

    fn ctx_with(store: InMemoryStore) -> RuleContext {
        RuleContext::new(
            Arc::new(store),
            Arc::new(InMemoryPrincipals::default()),
            Arc::new(RuleSettings::default()),
        )
    }

    #[tokio::test]
    async fn derives_missing_slug() {
        let rec = product("p1", "Café Clásico", None);
        let verdict = SlugRule
            .evaluate(&rec, &ctx_with(InMemoryStore::new()))
            .await
            .unwrap();
        let RuleVerdict::Patch(patch) = verdict else {
            panic!("expected patch, got {verdict:?}");
        };
        assert_eq!(
            patch.changes.get("slug"),
            Some(&FieldValue::text("cafe-clasico"))
        );
        assert_eq!(patch.unique_fields, vec!["slug".to_string()]);
    }

    #[tokio::test]
    async fn collision_gets_numeric_suffix() {
        let store = InMemoryStore::new();
        store.seed(product("p1", "Café Clásico", Some("cafe-clasico")));
        let rec = product("p2", "Café Clásico", None);
        let verdict = SlugRule.evaluate(&rec, &ctx_with(store)).await.unwrap();
        let RuleVerdict::Patch(patch) = verdict else {
            panic!("expected patch, got {verdict:?}");
        };
        assert_eq!(
            patch.changes.get("slug"),
            Some(&FieldValue::text("cafe-clasico-2"))
        );
    }

    #[tokio::test]
    async fn malformed_slug_is_rederived() {
        let rec = product("p1", "Good Name", Some("Bad Slug!"));
        assert!(SlugRule.applies(&rec));
        let verdict = SlugRule
            .evaluate(&rec, &ctx_with(InMemoryStore::new()))
            .await
            .unwrap();
        let RuleVerdict::Patch(patch) = verdict else {
            panic!("expected patch, got {verdict:?}");
        };
        assert_eq!(
            patch.changes.get("slug"),
            Some(&FieldValue::text("good-name"))
        );
    }

    #[tokio::test]
    async fn valid_slug_is_left_alone() {
        let rec = product("p1", "Fine", Some("fine"));
        assert!(!SlugRule.applies(&rec));
        let verdict = SlugRule
            .evaluate(&rec, &ctx_with(InMemoryStore::new()))
            .await
            .unwrap();
        assert_eq!(verdict, RuleVerdict::Compliant);
    }

    #[tokio::test]
    async fn unusable_name_goes_to_manual_review() {
        let rec = product("p1", "☃☃☃", None);
        let verdict = SlugRule
            .evaluate(&rec, &ctx_with(InMemoryStore::new()))
            .await
            .unwrap();
        assert!(matches!(verdict, RuleVerdict::ManualReview { .. }));
    }
}
