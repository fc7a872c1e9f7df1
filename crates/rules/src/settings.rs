use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Operator-tunable knobs shared by every rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSettings {
    /// Plausible price band in minor currency units. Values outside it are
    /// treated as unit-confusion defects and surfaced for manual review,
    /// never auto-corrected.
    pub price_min: i64,
    pub price_max: i64,

    /// Regex identifying seeded stand-in image URLs.
    pub placeholder_marker: String,
    /// Placeholder image lists keyed by category id.
    pub placeholder_images: BTreeMap<String, Vec<String>>,
    /// Fallback list when a product's category has no entry.
    pub default_placeholder_images: Vec<String>,

    /// Deterministic mojibake repairs: mis-decoded substring → correct text.
    pub encoding_repairs: BTreeMap<String, String>,

    /// Variant color spelling aliases, applied after lower-casing
    /// (e.g. "grey" → "gray"). Keys must already be lower-case.
    pub color_aliases: BTreeMap<String, String>,

    /// Suffix probing cap for store-unique values.
    pub max_suffix_attempts: u32,
}

impl Default for RuleSettings {
    fn default() -> Self {
        let mut encoding_repairs = BTreeMap::new();
        for (garbled, fixed) in [
            ("Ã¡", "á"),
            ("Ã©", "é"),
            ("Ã­", "í"),
            ("Ã³", "ó"),
            ("Ãº", "ú"),
            ("Ã±", "ñ"),
            ("Ã¼", "ü"),
            ("Ã\u{0081}", "Á"),
            ("Ã‰", "É"),
            ("Ã‘", "Ñ"),
            ("â€™", "’"),
            ("â€œ", "“"),
            ("â€\u{009d}", "”"),
            ("â€“", "–"),
        ] {
            encoding_repairs.insert(garbled.to_string(), fixed.to_string());
        }
        Self {
            price_min: 100,
            price_max: 10_000_000,
            placeholder_marker: r"/placeholders?/".to_string(),
            placeholder_images: BTreeMap::new(),
            default_placeholder_images: vec!["https://cdn.example.com/placeholders/default.jpg"
                .to_string()],
            encoding_repairs,
            color_aliases: BTreeMap::new(),
            max_suffix_attempts: 1000,
        }
    }
}

impl RuleSettings {
    pub fn price_in_band(&self, price: i64) -> bool {
        price >= self.price_min && price <= self.price_max
    }

    pub fn placeholders_for(&self, category_id: Option<&str>) -> &[String] {
        category_id
            .and_then(|id| self.placeholder_images.get(id))
            .unwrap_or(&self.default_placeholder_images)
    }

    /// Canonical matching form of a variant color: trimmed, lower-cased,
    /// then mapped through the alias table.
    pub fn canonical_color(&self, raw: &str) -> String {
        let lowered = raw.trim().to_lowercase();
        self.color_aliases.get(&lowered).cloned().unwrap_or(lowered)
    }
}
