use catalog_protocol::{CatalogRecord, RecordKind, RuleVerdict};
use catalog_store::StoreError;
use thiserror::Error;

pub mod context;
pub mod registry;
pub mod rules;
pub mod settings;
pub mod slugify;
pub mod uniqueness;

pub use context::RuleContext;
pub use registry::{ImageIntent, RuleRegistry};
pub use settings::RuleSettings;
pub use slugify::slugify;
pub use uniqueness::UniquenessResolver;

pub type Result<T> = std::result::Result<T, RuleError>;

#[derive(Error, Debug)]
pub enum RuleError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("no unique value for {kind} {field}={candidate} after {attempts} attempts")]
    UniquenessExhausted {
        kind: RecordKind,
        field: String,
        candidate: String,
        attempts: u32,
    },
}

/// One class of defect: inspects a record and either declares it compliant
/// or proposes a correction.
///
/// Rules are pure given their context; every external lookup goes through
/// the injected [`RuleContext`], never global state, so each rule tests in
/// isolation.
#[async_trait::async_trait]
pub trait InvariantRule: Send + Sync {
    fn name(&self) -> &'static str;

    fn applies_to(&self, kind: RecordKind) -> bool;

    /// Cheap pre-filter before the (possibly store-touching) evaluation.
    fn applies(&self, _record: &CatalogRecord) -> bool {
        true
    }

    async fn evaluate(&self, record: &CatalogRecord, ctx: &RuleContext) -> Result<RuleVerdict>;
}
