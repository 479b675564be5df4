//! Shared endpoint metadata cache.
//!
//! Maps an endpoint url to the chain id and server version it reported on
//! its last successful `get_info`. Aggregators resolve labels from here at
//! write time, so slow-changing metadata is never copied into updates.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use tracing::debug;

/// Entries older than this many seconds are evicted by [`EndpointCache::scrub`].
pub const EVICTION_WINDOW_SECS: i64 = 10 * 60;

/// Last-known metadata for one endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointInfo {
    pub chain_id: String,
    pub version: String,
    pub updated: DateTime<Utc>,
}

/// Url-keyed metadata cache guarded by a single read-write lock.
#[derive(Debug, Default)]
pub struct EndpointCache {
    entries: RwLock<HashMap<String, EndpointInfo>>,
}

impl EndpointCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, url: &str) -> Option<EndpointInfo> {
        self.entries.read().get(url).cloned()
    }

    /// Replace the entry for `url`, stamped with the current time.
    pub fn upsert(&self, url: &str, chain_id: &str, version: &str) {
        self.upsert_at(url, chain_id, version, Utc::now());
    }

    pub(crate) fn upsert_at(&self, url: &str, chain_id: &str, version: &str, at: DateTime<Utc>) {
        let info = EndpointInfo {
            chain_id: chain_id.to_string(),
            version: version.to_string(),
            updated: at,
        };
        self.entries.write().insert(url.to_string(), info);
    }

    /// Drop every entry not refreshed within [`EVICTION_WINDOW_SECS`].
    /// Returns the number of entries removed.
    pub fn scrub(&self) -> usize {
        self.scrub_at(Utc::now())
    }

    pub(crate) fn scrub_at(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::seconds(EVICTION_WINDOW_SECS);
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|url, info| {
            let keep = info.updated >= cutoff;
            if !keep {
                debug!(url = %url, updated = %info.updated, "evicting endpoint metadata");
            }
            keep
        });
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_replaces_wholesale() {
        let cache = EndpointCache::new();
        cache.upsert("http://a:8888", "mainnet", "v1");
        cache.upsert("http://a:8888", "testnet", "v2");

        let info = cache.get("http://a:8888").expect("entry present");
        assert_eq!(info.chain_id, "testnet");
        assert_eq!(info.version, "v2");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_get_missing() {
        let cache = EndpointCache::new();
        assert!(cache.get("http://nowhere").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_scrub_removes_only_expired() {
        let cache = EndpointCache::new();
        let now = Utc::now();

        cache.upsert_at("old", "mainnet", "v1", now - Duration::minutes(11));
        cache.upsert_at("edge", "mainnet", "v1", now - Duration::seconds(EVICTION_WINDOW_SECS));
        cache.upsert_at("fresh", "mainnet", "v1", now - Duration::seconds(30));

        assert_eq!(cache.scrub_at(now), 1);
        assert!(cache.get("old").is_none());
        // Exactly ten minutes old is not strictly older than the window.
        assert!(cache.get("edge").is_some());
        assert!(cache.get("fresh").is_some());
    }

    #[test]
    fn test_scrub_is_idempotent() {
        let cache = EndpointCache::new();
        let now = Utc::now();
        cache.upsert_at("old", "mainnet", "v1", now - Duration::hours(1));
        cache.upsert_at("fresh", "testnet", "v1", now);

        assert_eq!(cache.scrub_at(now), 1);
        let after_first = cache.get("fresh");
        assert_eq!(cache.scrub_at(now), 0);
        assert_eq!(cache.get("fresh"), after_first);
        assert_eq!(cache.len(), 1);
    }
}
