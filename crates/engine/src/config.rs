use catalog_protocol::{RecordKind, ALL_KINDS};
use catalog_rules::RuleSettings;
use catalog_store::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Engine-wide tuning. Durations are carried as milliseconds so the
/// config file stays plain TOML numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Kinds visited per run, parents first.
    pub scan_order: Vec<RecordKind>,
    pub page_size: usize,
    /// Worker-pool cap for records within a page. Unlimited parallelism
    /// is not an option; the remote store is rate-limited.
    pub workers: usize,
    /// Minimum spacing between writes, on top of worker limits.
    pub throttle_ms: u64,
    pub max_retries: u32,
    pub retry_base_ms: u64,
    pub request_timeout_ms: u64,
    pub rules: RuleSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scan_order: ALL_KINDS.to_vec(),
            page_size: 100,
            workers: 5,
            throttle_ms: 100,
            max_retries: 3,
            retry_base_ms: 250,
            request_timeout_ms: 5000,
            rules: RuleSettings::default(),
        }
    }
}

impl EngineConfig {
    pub fn throttle_interval(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries.max(1),
            base_delay: Duration::from_millis(self.retry_base_ms),
        }
    }

    /// Restrict the scan to one kind (the CLI's `<kind>` argument).
    pub fn with_only_kind(mut self, kind: RecordKind) -> Self {
        self.scan_order.retain(|k| *k == kind);
        if self.scan_order.is_empty() {
            self.scan_order.push(kind);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.page_size, 100);
        assert_eq!(config.workers, 5);
        assert_eq!(config.scan_order, ALL_KINDS.to_vec());
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: EngineConfig = toml::from_str(
            r#"
            page_size = 25
            workers = 2

            [rules]
            price_min = 50
            "#,
        )
        .expect("parses");
        assert_eq!(config.page_size, 25);
        assert_eq!(config.workers, 2);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.rules.price_min, 50);
        assert_eq!(config.rules.price_max, 10_000_000);
    }

    #[test]
    fn only_kind_narrows_scan_order() {
        let config = EngineConfig::default().with_only_kind(RecordKind::Product);
        assert_eq!(config.scan_order, vec![RecordKind::Product]);
    }
}
