use crate::{InvariantRule, Result, RuleContext};
use catalog_protocol::{CatalogRecord, FieldValue, Patch, RecordKind, RuleVerdict};
use regex::Regex;

pub const FALLBACK_RULE_NAME: &str = "image_fallback";
pub const CLEANUP_RULE_NAME: &str = "placeholder_cleanup";

/// Seeds a category-keyed placeholder list onto products with no images.
/// Never touches a non-empty list, so uploaded images are never shadowed.
///
/// Exact inverse of [`PlaceholderCleanupRule`]; the registry activates at
/// most one of the pair per run.
pub struct ImageFallbackRule;

#[async_trait::async_trait]
impl InvariantRule for ImageFallbackRule {
    fn name(&self) -> &'static str {
        FALLBACK_RULE_NAME
    }

    fn applies_to(&self, kind: RecordKind) -> bool {
        kind == RecordKind::Product
    }

    fn applies(&self, record: &CatalogRecord) -> bool {
        record.list("images").map_or(true, <[String]>::is_empty)
    }

    async fn evaluate(&self, record: &CatalogRecord, ctx: &RuleContext) -> Result<RuleVerdict> {
        if !self.applies(record) {
            return Ok(RuleVerdict::Compliant);
        }
        let category_id = record.text("category_id");
        let placeholders = ctx.settings().placeholders_for(category_id);
        if placeholders.is_empty() {
            return Ok(RuleVerdict::Compliant);
        }
        let patch = Patch::builder(FALLBACK_RULE_NAME, record)
            .reason(match category_id {
                Some(c) => format!("seeded placeholder images for category `{c}`"),
                None => "seeded default placeholder images".to_string(),
            })
            .set("images", FieldValue::list(placeholders.iter().cloned()))
            .build();
        match patch {
            Some(patch) => Ok(RuleVerdict::Patch(patch)),
            None => Ok(RuleVerdict::Compliant),
        }
    }
}

/// Strips placeholder-origin URLs (matched by the configured marker) so
/// real uploads are never shadowed by seeded stand-ins.
pub struct PlaceholderCleanupRule;

#[async_trait::async_trait]
impl InvariantRule for PlaceholderCleanupRule {
    fn name(&self) -> &'static str {
        CLEANUP_RULE_NAME
    }

    fn applies_to(&self, kind: RecordKind) -> bool {
        kind == RecordKind::Product
    }

    fn applies(&self, record: &CatalogRecord) -> bool {
        record.list("images").is_some_and(|l| !l.is_empty())
    }

    async fn evaluate(&self, record: &CatalogRecord, ctx: &RuleContext) -> Result<RuleVerdict> {
        let Some(images) = record.list("images").filter(|l| !l.is_empty()) else {
            return Ok(RuleVerdict::Compliant);
        };
        let marker = match Regex::new(&ctx.settings().placeholder_marker) {
            Ok(re) => re,
            Err(err) => {
                log::warn!("invalid placeholder marker pattern: {err}");
                return Ok(RuleVerdict::Compliant);
            }
        };
        let kept: Vec<String> = images
            .iter()
            .filter(|url| !marker.is_match(url))
            .cloned()
            .collect();
        if kept.len() == images.len() {
            return Ok(RuleVerdict::Compliant);
        }
        let removed = images.len() - kept.len();
        let patch = Patch::builder(CLEANUP_RULE_NAME, record)
            .reason(format!("removed {removed} placeholder-origin image(s)"))
            .set("images", FieldValue::List(kept))
            .build();
        match patch {
            Some(patch) => Ok(RuleVerdict::Patch(patch)),
            None => Ok(RuleVerdict::Compliant),
        }
    }
}
