//! Cache configuration.

use std::time::Duration;

use serde::Deserialize;

const DEFAULT_EXPIRATION_SECS: u64 = 30;

/// Cache tuning knobs from `mercato.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// When disabled, every read recomputes; useful for tests and debugging.
    pub enabled: bool,
    /// Seconds before a cached value goes stale.
    pub expiration_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            expiration_seconds: DEFAULT_EXPIRATION_SECS,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            expiration_seconds: settings.expiration.as_secs().max(1),
        }
    }
}

impl CacheConfig {
    /// Expiration as a duration, clamped away from zero so a cached value is
    /// never born already stale.
    pub fn expiration(&self) -> Duration {
        Duration::from_secs(self.expiration_seconds.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.expiration_seconds, 30);
    }

    #[test]
    fn zero_expiration_clamps_to_one_second() {
        let config = CacheConfig {
            expiration_seconds: 0,
            ..Default::default()
        };
        assert_eq!(config.expiration(), Duration::from_secs(1));
    }
}
