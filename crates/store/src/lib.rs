pub mod error;
pub mod memory;
pub mod principal;
pub mod source;
pub mod store;
pub mod throttle;

pub use error::{Result, StoreError};
pub use memory::{FaultPlan, InMemoryPrincipals, InMemoryStore};
pub use principal::{Principal, PrincipalDirectory};
pub use source::{RecordSource, RetryPolicy};
pub use store::{CatalogStore, Page, PageRequest, DEFAULT_PAGE_SIZE};
pub use throttle::Throttle;
