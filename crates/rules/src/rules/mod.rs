mod encoding;
mod images;
mod price;
mod profile;
mod slug;
mod stock;
mod variant;

pub use encoding::EncodingRepairRule;
pub use images::{ImageFallbackRule, PlaceholderCleanupRule};
pub use price::PriceRangeRule;
pub use profile::ProfileRepairRule;
pub use slug::SlugRule;
pub use stock::StockConsistencyRule;
pub use variant::{ColorNormalizationRule, VariantIntegrityRule};
