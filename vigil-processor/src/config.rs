use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Processor timing, the `[processor]` section of the node config.
///
/// All values are seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
    pub cleanup_interval_secs: u64,
    pub governor_interval_secs: u64,
    /// Age after which an entry is settled and non-signers are counted as
    /// having missed it.
    pub settlement_secs: u64,
    /// Age of the first re-observation request; later retries double it.
    pub first_retry_secs: u64,
    pub max_retry_backoff_secs: u64,
    pub max_retries: u32,
    /// How long a submitted entry is kept.
    pub submitted_retention_secs: u64,
    /// How long an unsubmitted entry we observed ourselves is kept.
    pub own_retention_secs: u64,
    /// How long an unsubmitted entry we only heard about is kept.
    pub foreign_retention_secs: u64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            cleanup_interval_secs: 30,
            governor_interval_secs: 60,
            settlement_secs: 30,
            first_retry_secs: 5 * 60,
            max_retry_backoff_secs: 4 * 60 * 60,
            max_retries: 10,
            submitted_retention_secs: 60 * 60,
            own_retention_secs: 24 * 60 * 60,
            foreign_retention_secs: 60 * 60,
        }
    }
}

impl ProcessorConfig {
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }

    pub fn governor_interval(&self) -> Duration {
        Duration::from_secs(self.governor_interval_secs.max(1))
    }

    /// Minimum time between the `retry_count`-th and next re-observation
    /// request: `first_retry · 2^retry_count`, capped.
    pub fn retry_backoff(&self, retry_count: u32) -> u64 {
        let factor = 1u64.checked_shl(retry_count).unwrap_or(u64::MAX);
        self.first_retry_secs
            .saturating_mul(factor)
            .min(self.max_retry_backoff_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_backoff_doubles_and_caps() {
        let cfg = ProcessorConfig::default();
        assert_eq!(cfg.retry_backoff(0), 300);
        assert_eq!(cfg.retry_backoff(1), 600);
        assert_eq!(cfg.retry_backoff(3), 2400);
        assert_eq!(cfg.retry_backoff(6), 4 * 60 * 60);
        assert_eq!(cfg.retry_backoff(200), 4 * 60 * 60);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let cfg = ProcessorConfig {
            cleanup_interval_secs: 0,
            ..ProcessorConfig::default()
        };
        assert_eq!(cfg.cleanup_interval(), Duration::from_secs(1));
    }
}
