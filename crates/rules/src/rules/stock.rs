use crate::{InvariantRule, Result, RuleContext};
use catalog_protocol::{CatalogRecord, FieldValue, Filter, RecordKind, RuleVerdict};

pub const RULE_NAME: &str = "stock_consistency";

/// Reporting-only: flags active products whose active variants hold zero
/// total stock. Deactivation is a business decision, so the engine never
/// does it on its own.
pub struct StockConsistencyRule;

#[async_trait::async_trait]
impl InvariantRule for StockConsistencyRule {
    fn name(&self) -> &'static str {
        RULE_NAME
    }

    fn applies_to(&self, kind: RecordKind) -> bool {
        kind == RecordKind::Product
    }

    fn applies(&self, record: &CatalogRecord) -> bool {
        record.bool("is_active").unwrap_or(false)
    }

    async fn evaluate(&self, record: &CatalogRecord, ctx: &RuleContext) -> Result<RuleVerdict> {
        if !self.applies(record) {
            return Ok(RuleVerdict::Compliant);
        }
        let filter = Filter::and(vec![
            Filter::equals("product_id", FieldValue::text(record.id.as_str())),
            Filter::equals("is_active", FieldValue::Bool(true)),
        ]);
        let variants = ctx.collect(RecordKind::Variant, &filter).await?;
        if variants.is_empty() {
            return Ok(RuleVerdict::Report {
                rule: RULE_NAME.to_string(),
                note: "active product has no active variants".to_string(),
            });
        }
        let total: i64 = variants
            .iter()
            .filter_map(|v| v.int("stock_quantity"))
            .sum();
        if total == 0 {
            return Ok(RuleVerdict::Report {
                rule: RULE_NAME.to_string(),
                note: format!(
                    "active product has zero stock across {} active variant(s)",
                    variants.len()
                ),
            });
        }
        Ok(RuleVerdict::Compliant)
    }
}
