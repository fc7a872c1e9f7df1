use crate::{InvariantRule, Result, RuleContext};
use catalog_protocol::{CatalogRecord, RecordKind, RuleVerdict};

pub const RULE_NAME: &str = "price_range";

/// Flags prices outside the plausible band for manual correction.
///
/// Out-of-band values usually mean unit confusion (whole currency written
/// where minor units belong), and the right value is not derivable from
/// the record, so this rule never proposes a patch.
pub struct PriceRangeRule;

#[async_trait::async_trait]
impl InvariantRule for PriceRangeRule {
    fn name(&self) -> &'static str {
        RULE_NAME
    }

    fn applies_to(&self, kind: RecordKind) -> bool {
        kind == RecordKind::Product
    }

    async fn evaluate(&self, record: &CatalogRecord, ctx: &RuleContext) -> Result<RuleVerdict> {
        let price = record.int("base_price");
        let reason = match price {
            None => "base_price is missing".to_string(),
            Some(0) => "base_price is zero".to_string(),
            Some(p) if !ctx.settings().price_in_band(p) => format!(
                "base_price {p} outside plausible band {}..={} (unit confusion?)",
                ctx.settings().price_min,
                ctx.settings().price_max
            ),
            Some(_) => return Ok(RuleVerdict::Compliant),
        };
        Ok(RuleVerdict::ManualReview {
            rule: RULE_NAME.to_string(),
            reason,
        })
    }
}
