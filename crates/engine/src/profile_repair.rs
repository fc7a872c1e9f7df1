use catalog_protocol::{FieldValue, Filter, RecordId, RecordKind, Role, RunMode};
use catalog_store::{CatalogStore, PageRequest, PrincipalDirectory, Result};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Result of an explicit missing-profile repair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileRepairOutcome {
    /// No authentication principal exists for the email; nothing to repair.
    NoPrincipal,
    /// A profile already references this principal.
    AlreadyExists(RecordId),
    /// Dry run: a profile would have been created.
    WouldCreate,
    Created(RecordId),
}

/// Create the missing Profile for an existing authentication principal.
///
/// This is the only insert the engine ever performs, and it is an
/// explicit operator action behind its own subcommand, never a side
/// effect of a scan.
pub async fn repair_missing_profile(
    store: &Arc<dyn CatalogStore>,
    principals: &Arc<dyn PrincipalDirectory>,
    email: &str,
    mode: RunMode,
) -> Result<ProfileRepairOutcome> {
    let normalized = email.trim().to_lowercase();
    let Some(principal) = principals.find_principal_by_email(&normalized).await? else {
        log::warn!("no authentication principal for `{normalized}`; refusing to create a profile");
        return Ok(ProfileRepairOutcome::NoPrincipal);
    };

    let filter = Filter::equals("email", FieldValue::text(normalized.clone()));
    let existing = store
        .list(RecordKind::Profile, &filter, PageRequest::first(1))
        .await?;
    if let Some(profile) = existing.records.first() {
        return Ok(ProfileRepairOutcome::AlreadyExists(profile.id.clone()));
    }

    if !mode.is_commit() {
        log::info!(
            "[dry-run] would create profile for principal {} ({normalized})",
            principal.id
        );
        return Ok(ProfileRepairOutcome::WouldCreate);
    }

    let mut fields = BTreeMap::new();
    fields.insert("email".to_string(), FieldValue::text(normalized.clone()));
    fields.insert(
        "role".to_string(),
        FieldValue::text(Role::Customer.as_str()),
    );
    fields.insert(
        "principal_id".to_string(),
        FieldValue::text(principal.id.clone()),
    );
    let id = store.insert(RecordKind::Profile, fields).await?;
    log::warn!(
        "created missing profile {id} for principal {} ({normalized})",
        principal.id
    );
    Ok(ProfileRepairOutcome::Created(id))
}
