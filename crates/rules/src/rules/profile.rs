use crate::{InvariantRule, Result, RuleContext};
use catalog_protocol::{CatalogRecord, FieldValue, Patch, RecordKind, Role, RuleVerdict};

pub const RULE_NAME: &str = "profile_repair";

/// Normalizes profile emails and fills a truly absent role with the
/// lowest privilege.
///
/// A role that parses is never rewritten (no silent downgrades), and an
/// unparseable role goes to manual review because the intended privilege
/// cannot be inferred. Profiles whose email matches no authentication
/// principal are flagged, never deleted.
pub struct ProfileRepairRule;

impl ProfileRepairRule {
    fn normalize_email(email: &str) -> String {
        email.trim().to_lowercase()
    }
}

#[async_trait::async_trait]
impl InvariantRule for ProfileRepairRule {
    fn name(&self) -> &'static str {
        RULE_NAME
    }

    fn applies_to(&self, kind: RecordKind) -> bool {
        kind == RecordKind::Profile
    }

    async fn evaluate(&self, record: &CatalogRecord, ctx: &RuleContext) -> Result<RuleVerdict> {
        let Some(email) = record.text("email").filter(|e| !e.trim().is_empty()) else {
            return Ok(RuleVerdict::ManualReview {
                rule: RULE_NAME.to_string(),
                reason: "profile has no email".to_string(),
            });
        };

        let normalized = Self::normalize_email(email);
        let principal = ctx.principals().find_principal_by_email(&normalized).await?;
        if principal.is_none() {
            return Ok(RuleVerdict::ManualReview {
                rule: RULE_NAME.to_string(),
                reason: format!("no authentication principal for `{normalized}`"),
            });
        }

        let mut builder = Patch::builder(RULE_NAME, record).reason("normalized profile fields");
        if normalized != email {
            builder = builder.set("email", FieldValue::text(normalized));
        }

        match record.field("role") {
            None | Some(FieldValue::Null) => {
                builder = builder.set("role", FieldValue::text(Role::Customer.as_str()));
            }
            Some(FieldValue::Text(raw)) if raw.parse::<Role>().is_err() => {
                // Guessing here could demote an admin.
                return Ok(RuleVerdict::ManualReview {
                    rule: RULE_NAME.to_string(),
                    reason: format!("unrecognized role `{raw}`"),
                });
            }
            Some(_) => {}
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
    use catalog_store::{InMemoryPrincipals, InMemoryStore, Principal};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn profile(email: Option<&str>, role: Option<&str>) -> CatalogRecord {
        let mut rec = CatalogRecord::new(RecordId::from("u1"), RecordKind::Profile, 1);
        rec.set_field("email", email.map_or(FieldValue::Null, FieldValue::text));
        rec.set_field("role", role.map_or(FieldValue::Null, FieldValue::text));
        rec
    }

    fn ctx_with_principal(email: &str) -> RuleContext {
        RuleContext::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(InMemoryPrincipals::new(vec![Principal {
                id: "auth-1".to_string(),
                email: email.to_string(),
            }])),
            Arc::new(RuleSettings::default()),
        )
    }

    #[tokio::test]
    async fn normalizes_email_and_fills_missing_role() {
        let rec = profile(Some(" Ada@Example.com "), None);
        let verdict = ProfileRepairRule
            .evaluate(&rec, &ctx_with_principal("ada@example.com"))
            .await
            .unwrap();
        let RuleVerdict::Patch(patch) = verdict else {
            panic!("expected patch, got {verdict:?}");
        };
        assert_eq!(
            patch.changes.get("email"),
            Some(&FieldValue::text("ada@example.com"))
        );
        assert_eq!(patch.changes.get("role"), Some(&FieldValue::text("customer")));
    }

    #[tokio::test]
    async fn valid_admin_role_is_untouched() {
        let rec = profile(Some("ada@example.com"), Some("admin"));
        let verdict = ProfileRepairRule
            .evaluate(&rec, &ctx_with_principal("ada@example.com"))
            .await
            .unwrap();
        assert_eq!(verdict, RuleVerdict::Compliant);
    }

    #[tokio::test]
    async fn unrecognized_role_goes_to_manual_review() {
        let rec = profile(Some("ada@example.com"), Some("administrator"));
        let verdict = ProfileRepairRule
            .evaluate(&rec, &ctx_with_principal("ada@example.com"))
            .await
            .unwrap();
        assert!(matches!(verdict, RuleVerdict::ManualReview { .. }));
    }

    #[tokio::test]
    async fn orphan_profile_is_flagged() {
        let rec = profile(Some("ghost@example.com"), Some("customer"));
        let verdict = ProfileRepairRule
            .evaluate(&rec, &ctx_with_principal("ada@example.com"))
            .await
            .unwrap();
        assert!(matches!(verdict, RuleVerdict::ManualReview { .. }));
    }
}
