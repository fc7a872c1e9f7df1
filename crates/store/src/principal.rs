use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// An authentication principal as seen by the external identity system.
/// The engine only ever reads these.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub email: String,
}

/// Read-only lookup into the authentication principal store.
#[async_trait]
pub trait PrincipalDirectory: Send + Sync {
    async fn find_principal_by_email(&self, email: &str) -> Result<Option<Principal>>;
}
