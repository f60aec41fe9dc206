//! Feature flags with push-invalidated caching
//!
//! Lookups are cached for a short TTL; the admin surface POSTs an
//! invalidation when a flag changes so the next read refills from the
//! store. Flags marked `required` are security-critical and always bypass
//! the cache.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// One feature flag as stored in the admin backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureFlag {
    pub name: String,
    pub enabled: bool,
    #[serde(default)]
    pub category: Option<String>,
    /// Structured per-flag configuration
    #[serde(default)]
    pub config: Option<serde_json::Value>,
    /// Security-critical flags are never served from cache
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Clone)]
struct CachedFlag {
    flag: FeatureFlag,
    cached_at: Instant,
}

/// Per-flag cache with TTL and explicit invalidation
pub struct FeatureFlagCache {
    entries: RwLock<HashMap<String, CachedFlag>>,
    ttl: Duration,
}

/// Cache inspection row for the debug endpoint
#[derive(Debug, Clone, Serialize)]
pub struct FlagCacheEntry {
    pub name: String,
    pub enabled: bool,
    pub age_seconds: f64,
    pub expires_in_seconds: f64,
}

impl FeatureFlagCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Fresh cached flag, if any. Required flags are never returned from
    /// cache so their decisions always hit the store.
    pub fn get(&self, name: &str) -> Option<FeatureFlag> {
        let entries = self.entries.read();
        let cached = entries.get(name)?;
        if cached.flag.required || cached.cached_at.elapsed() > self.ttl {
            return None;
        }
        Some(cached.flag.clone())
    }

    pub fn put(&self, flag: FeatureFlag) {
        self.entries.write().insert(
            flag.name.clone(),
            CachedFlag {
                flag,
                cached_at: Instant::now(),
            },
        );
    }

    /// Invalidate specific flags; returns the names actually removed.
    pub fn invalidate(&self, names: &[String]) -> Vec<String> {
        let mut entries = self.entries.write();
        names
            .iter()
            .filter(|n| entries.remove(n.as_str()).is_some())
            .cloned()
            .collect()
    }

    /// Drop everything; returns how many entries were cached.
    pub fn invalidate_all(&self) -> usize {
        let mut entries = self.entries.write();
        let count = entries.len();
        entries.clear();
        count
    }

    /// Snapshot for `/debug/feature-flags`.
    pub fn inspect(&self) -> Vec<FlagCacheEntry> {
        let ttl = self.ttl.as_secs_f64();
        self.entries
            .read()
            .values()
            .map(|c| {
                let age = c.cached_at.elapsed().as_secs_f64();
                FlagCacheEntry {
                    name: c.flag.name.clone(),
                    enabled: c.flag.enabled,
                    age_seconds: age,
                    expires_in_seconds: (ttl - age).max(0.0),
                }
            })
            .collect()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flag(name: &str, enabled: bool, required: bool) -> FeatureFlag {
        FeatureFlag {
            name: name.to_string(),
            enabled,
            category: None,
            config: None,
            required,
        }
    }

    #[test]
    fn test_put_and_get() {
        let cache = FeatureFlagCache::new(Duration::from_secs(60));
        cache.put(flag("llm_based_routing", true, false));
        assert!(cache.get("llm_based_routing").unwrap().enabled);
        assert!(cache.get("unknown").is_none());
    }

    #[test]
    fn test_required_flags_bypass_cache() {
        let cache = FeatureFlagCache::new(Duration::from_secs(60));
        cache.put(flag("api_key_check", true, true));
        assert!(cache.get("api_key_check").is_none());
    }

    #[test]
    fn test_invalidate_specific_and_all() {
        let cache = FeatureFlagCache::new(Duration::from_secs(60));
        cache.put(flag("a", true, false));
        cache.put(flag("b", false, false));

        let removed = cache.invalidate(&["a".to_string(), "missing".to_string()]);
        assert_eq!(removed, vec!["a".to_string()]);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());

        assert_eq!(cache.invalidate_all(), 1);
        assert!(cache.get("b").is_none());
    }
}
