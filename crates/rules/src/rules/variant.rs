use crate::{InvariantRule, Result, RuleContext};
use catalog_protocol::{CatalogRecord, FieldValue, Patch, RecordId, RecordKind, RuleVerdict};
use catalog_store::StoreError;

pub const COLOR_RULE_NAME: &str = "color_normalization";
pub const INTEGRITY_RULE_NAME: &str = "variant_integrity";

/// Rewrites a variant's color to its canonical matching form: trimmed,
/// lower-cased, alias-mapped. A color that trims to nothing becomes null.
pub struct ColorNormalizationRule;

#[async_trait::async_trait]
impl InvariantRule for ColorNormalizationRule {
    fn name(&self) -> &'static str {
        COLOR_RULE_NAME
    }

    fn applies_to(&self, kind: RecordKind) -> bool {
        kind == RecordKind::Variant
    }

    async fn evaluate(&self, record: &CatalogRecord, ctx: &RuleContext) -> Result<RuleVerdict> {
        let Some(color) = record.text("color") else {
            return Ok(RuleVerdict::Compliant);
        };
        let canonical = ctx.settings().canonical_color(color);
        let replacement = if canonical.is_empty() {
            FieldValue::Null
        } else if canonical == color {
            return Ok(RuleVerdict::Compliant);
        } else {
            FieldValue::text(canonical)
        };
        let patch = Patch::builder(COLOR_RULE_NAME, record)
            .reason("canonicalized variant color")
            .set("color", replacement)
            .build();
        Ok(match patch {
            Some(patch) => RuleVerdict::Patch(patch),
            None => RuleVerdict::Compliant,
        })
    }
}

/// Reference and SKU checks, never patched: a SKU is an external
/// identifier, so rewriting one is an operator decision.
pub struct VariantIntegrityRule;

#[async_trait::async_trait]
impl InvariantRule for VariantIntegrityRule {
    fn name(&self) -> &'static str {
        INTEGRITY_RULE_NAME
    }

    fn applies_to(&self, kind: RecordKind) -> bool {
        kind == RecordKind::Variant
    }

    async fn evaluate(&self, record: &CatalogRecord, ctx: &RuleContext) -> Result<RuleVerdict> {
        let review = |reason: String| {
            Ok(RuleVerdict::ManualReview {
                rule: INTEGRITY_RULE_NAME.to_string(),
                reason,
            })
        };

        let Some(product_id) = record.text("product_id").filter(|p| !p.is_empty()) else {
            return review("variant has no product reference".to_string());
        };
        match ctx
            .store()
            .get(RecordKind::Product, &RecordId::from(product_id))
            .await
        {
            Ok(_) => {}
            Err(StoreError::NotFound { .. }) => {
                return review(format!("references missing product `{product_id}`"));
            }
            Err(err) => return Err(err.into()),
        }

        let Some(sku) = record.text("sku").filter(|s| !s.is_empty()) else {
            return review("variant has no sku".to_string());
        };
        if ctx
            .uniqueness()
            .is_taken(RecordKind::Variant, "sku", sku, &record.id)
            .await?
        {
            return review(format!("sku `{sku}` held by another variant"));
        }
        Ok(RuleVerdict::Compliant)
    }
}
