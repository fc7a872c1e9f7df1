use crate::{InvariantRule, Result, RuleContext};
use catalog_protocol::{CatalogRecord, FieldValue, Patch, RecordKind, RuleVerdict};
use std::collections::BTreeMap;

pub const RULE_NAME: &str = "encoding_repair";

const REPLACEMENT_CHAR: char = '\u{FFFD}';

/// Byte-garble signatures left behind by a UTF-8 stream decoded as
/// Latin-1/CP-1252. Presence of one marks the text as mojibake even when
/// the repair table has no entry for it.
const MOJIBAKE_SIGNATURES: &[&str] = &["Ã", "Â", "â€", "ï¿½"];

/// Repairs text fields carrying mojibake when the configured repair table
/// maps the garble deterministically; anything it cannot map goes to
/// manual review. Runs before slug derivation so a corrupted name never
/// leaks into a derived slug.
pub struct EncodingRepairRule;

impl EncodingRepairRule {
    /// Text fields scanned per kind.
    fn fields_for(kind: RecordKind) -> &'static [&'static str] {
        match kind {
            RecordKind::Product | RecordKind::Category => &["name"],
            RecordKind::Variant => &["color", "size"],
            RecordKind::Profile => &[],
        }
    }

    fn is_suspect(text: &str) -> bool {
        text.contains(REPLACEMENT_CHAR)
            || MOJIBAKE_SIGNATURES.iter().any(|sig| text.contains(sig))
    }

    /// Apply the repair table to fixpoint. Each table entry may itself
    /// produce text another entry matches, so a single pass is not enough.
    fn repair(text: &str, table: &BTreeMap<String, String>) -> String {
        let mut current = text.to_string();
        for _ in 0..8 {
            let mut next = current.clone();
            for (garbled, fixed) in table {
                next = next.replace(garbled.as_str(), fixed);
            }
            if next == current {
                break;
            }
            current = next;
        }
        current
    }
}

#[async_trait::async_trait]
impl InvariantRule for EncodingRepairRule {
    fn name(&self) -> &'static str {
        RULE_NAME
    }

    fn applies_to(&self, kind: RecordKind) -> bool {
        !Self::fields_for(kind).is_empty()
    }

    fn applies(&self, record: &CatalogRecord) -> bool {
        Self::fields_for(record.kind)
            .iter()
            .filter_map(|f| record.text(f))
            .any(Self::is_suspect)
    }

    async fn evaluate(&self, record: &CatalogRecord, ctx: &RuleContext) -> Result<RuleVerdict> {
        let table = &ctx.settings().encoding_repairs;
        let mut builder = Patch::builder(RULE_NAME, record).reason("repaired mojibake text");
        let mut changed = false;

        for field in Self::fields_for(record.kind) {
            let Some(text) = record.text(field) else {
                continue;
            };
            if !Self::is_suspect(text) {
                continue;
            }
            let repaired = Self::repair(text, table);
            if Self::is_suspect(&repaired) {
                return Ok(RuleVerdict::ManualReview {
                    rule: RULE_NAME.to_string(),
                    reason: format!("no deterministic repair for field `{field}`"),
                });
            }
            builder = builder.set(*field, FieldValue::text(repaired));
            changed = true;
        }

        if !changed {
            return Ok(RuleVerdict::Compliant);
        }
        match builder.build() {
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

    fn ctx() -> RuleContext {
        RuleContext::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(InMemoryPrincipals::default()),
            Arc::new(RuleSettings::default()),
        )
    }

    fn product(name: &str) -> CatalogRecord {
        let mut rec = CatalogRecord::new(RecordId::from("p1"), RecordKind::Product, 1);
        rec.set_field("name", FieldValue::text(name));
        rec
    }

    #[tokio::test]
    async fn repairs_known_garble() {
        let rec = product("CafÃ© ClÃ¡sico");
        let rule = EncodingRepairRule;
        assert!(rule.applies(&rec));
        let verdict = rule.evaluate(&rec, &ctx()).await.unwrap();
        let RuleVerdict::Patch(patch) = verdict else {
            panic!("expected patch, got {verdict:?}");
        };
        assert_eq!(
            patch.changes.get("name"),
            Some(&FieldValue::text("Café Clásico"))
        );
    }

    #[tokio::test]
    async fn replacement_char_goes_to_manual_review() {
        let rec = product("Caf\u{FFFD} Cl\u{FFFD}sico");
        let verdict = EncodingRepairRule.evaluate(&rec, &ctx()).await.unwrap();
        assert!(matches!(verdict, RuleVerdict::ManualReview { .. }));
    }

    #[tokio::test]
    async fn clean_text_is_out_of_scope() {
        let rec = product("Café Clásico");
        assert!(!EncodingRepairRule.applies(&rec));
        let verdict = EncodingRepairRule.evaluate(&rec, &ctx()).await.unwrap();
        assert_eq!(verdict, RuleVerdict::Compliant);
    }

    #[tokio::test]
    async fn variant_color_is_scanned() {
        let mut rec = CatalogRecord::new(RecordId::from("v1"), RecordKind::Variant, 1);
        rec.set_field("color", FieldValue::text("azul aÃ±il"));
        let verdict = EncodingRepairRule.evaluate(&rec, &ctx()).await.unwrap();
        let RuleVerdict::Patch(patch) = verdict else {
            panic!("expected patch, got {verdict:?}");
        };
        assert_eq!(
            patch.changes.get("color"),
            Some(&FieldValue::text("azul añil"))
        );
    }
}
