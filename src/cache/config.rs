//! Cache configuration.

use std::num::NonZeroUsize;
use std::time::Duration;

// Default values for cache configuration
const DEFAULT_TTL_SECONDS: u64 = 300;
const DEFAULT_POST_LIMIT: usize = 500;
const DEFAULT_COLLECTION_LIMIT: usize = 100;

/// Tuning knobs for the content cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long a resolved entry stays live. Applies only to resolved
    /// entries; an in-flight fetch is never expired.
    pub ttl: Duration,
    /// Maximum cached single posts.
    pub post_limit: usize,
    /// Maximum cached per-owner collections (post lists, memos, links, likes).
    pub collection_limit: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_TTL_SECONDS),
            post_limit: DEFAULT_POST_LIMIT,
            collection_limit: DEFAULT_COLLECTION_LIMIT,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            ttl: Duration::from_secs(settings.ttl_seconds.get()),
            post_limit: settings.post_limit,
            collection_limit: settings.collection_limit,
        }
    }
}

impl CacheConfig {
    /// Returns the single-post limit as NonZeroUsize, clamping to 1 if zero.
    pub fn post_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.post_limit).unwrap_or(NonZeroUsize::MIN)
    }

    /// Returns the collection limit as NonZeroUsize, clamping to 1 if zero.
    pub fn collection_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.collection_limit).unwrap_or(NonZeroUsize::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert_eq!(config.ttl, Duration::from_secs(300));
        assert_eq!(config.post_limit, 500);
        assert_eq!(config.collection_limit, 100);
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = CacheConfig {
            post_limit: 0,
            ..Default::default()
        };
        assert_eq!(config.post_limit_non_zero().get(), 1);
    }
}
