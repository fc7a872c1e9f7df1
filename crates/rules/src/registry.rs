use crate::rules::{
    ColorNormalizationRule, EncodingRepairRule, ImageFallbackRule, PlaceholderCleanupRule,
    PriceRangeRule, ProfileRepairRule, SlugRule, StockConsistencyRule, VariantIntegrityRule,
};
use crate::InvariantRule;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which of the two mutually-exclusive image rules a run activates.
/// `Seed` fills empty image lists, `Clean` strips seeded placeholders;
/// running both in one pass would fight itself, so the operator picks.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ImageIntent {
    #[default]
    Off,
    Seed,
    Clean,
}

/// Ordered rule collection. The order is part of the contract: encoding
/// repair runs before slug derivation because a corrupted name corrupts a
/// derived slug, and the first non-compliant verdict wins per record.
pub struct RuleRegistry {
    rules: Vec<Arc<dyn InvariantRule>>,
}

impl RuleRegistry {
    pub fn standard(image_intent: ImageIntent) -> Self {
        let mut rules: Vec<Arc<dyn InvariantRule>> = vec![
            Arc::new(EncodingRepairRule),
            Arc::new(SlugRule),
            Arc::new(ColorNormalizationRule),
            Arc::new(PriceRangeRule),
        ];
        match image_intent {
            ImageIntent::Seed => rules.push(Arc::new(ImageFallbackRule)),
            ImageIntent::Clean => rules.push(Arc::new(PlaceholderCleanupRule)),
            ImageIntent::Off => {}
        }
        rules.push(Arc::new(StockConsistencyRule));
        rules.push(Arc::new(VariantIntegrityRule));
        rules.push(Arc::new(ProfileRepairRule));
        Self { rules }
    }

    /// Keep only the named rules, preserving registry order. Unknown names
    /// are ignored (the CLI validates them upfront).
    pub fn with_allowlist(mut self, allowed: &[String]) -> Self {
        if !allowed.is_empty() {
            self.rules
                .retain(|rule| allowed.iter().any(|name| name == rule.name()));
        }
        self
    }

    pub fn rules(&self) -> &[Arc<dyn InvariantRule>] {
        &self.rules
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Every rule name the standard registry can carry, for flag validation.
    pub fn known_rule_names() -> Vec<&'static str> {
        let mut names = Self::standard(ImageIntent::Seed).rule_names();
        names.extend(Self::standard(ImageIntent::Clean).rule_names());
        names.sort_unstable();
        names.dedup();
        names
    }
}
