//! Cache storage and the semantic-cache facade
//!
//! The store is a trait so deployments can swap the in-memory map for an
//! external cache. Writes are idempotent and last-writer-wins; an entry
//! is either fully visible or absent, never partial.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::category::{extract_semantic_intent, CacheCategory};
use crate::key::{cache_key, LocationOverride};
use crate::rules::is_cacheable;

/// Metadata envelope stored with every payload, for debugging and
/// selective invalidation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub category: CacheCategory,
    pub normalized_query: String,
    pub stored_at: DateTime<Utc>,
    pub ttl_seconds: u64,
}

/// One stored entry
#[derive(Debug, Clone)]
pub struct CachedEntry {
    pub payload: Value,
    pub meta: CacheMetadata,
}

/// Pluggable cache backend
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch an entry; expired entries are treated as absent.
    async fn get(&self, key: &str) -> Option<CachedEntry>;

    /// Store an entry with a TTL. Replaces any existing entry atomically.
    async fn set(&self, key: &str, entry: CachedEntry, ttl: Duration);

    /// Delete every key starting with `prefix`; returns how many.
    async fn delete_prefix(&self, prefix: &str) -> usize;
}

struct StoredValue {
    entry: CachedEntry,
    expires_at: Instant,
}

/// Default in-memory store
#[derive(Default)]
pub struct InMemoryCacheStore {
    entries: DashMap<String, StoredValue>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Option<CachedEntry> {
        let stored = self.entries.get(key)?;
        if Instant::now() >= stored.expires_at {
            drop(stored);
            self.entries.remove(key);
            return None;
        }
        Some(stored.entry.clone())
    }

    async fn set(&self, key: &str, entry: CachedEntry, ttl: Duration) {
        self.entries.insert(
            key.to_string(),
            StoredValue {
                entry,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    async fn delete_prefix(&self, prefix: &str) -> usize {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|kv| kv.key().starts_with(prefix))
            .map(|kv| kv.key().clone())
            .collect();
        for key in &keys {
            self.entries.remove(key);
        }
        keys.len()
    }
}

/// The semantic cache facade used by the gateway pipeline
pub struct SemanticCache {
    store: Arc<dyn CacheStore>,
}

impl SemanticCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryCacheStore::new()))
    }

    /// Check for a semantically equivalent cached response.
    pub async fn get(
        &self,
        query: &str,
        location_override: Option<&LocationOverride>,
    ) -> Option<Value> {
        let (category, normalized) = extract_semantic_intent(query);
        if !is_cacheable(category, query) {
            tracing::debug!(category = category.as_str(), "semantic cache skip");
            return None;
        }

        let key = cache_key(&normalized, location_override);
        match self.store.get(&key).await {
            Some(entry) => {
                tracing::info!(
                    category = category.as_str(),
                    key = %key,
                    "semantic cache hit"
                );
                Some(entry.payload)
            }
            None => {
                tracing::debug!(key = %key, "semantic cache miss");
                None
            }
        }
    }

    /// Cache a response with the category TTL. Returns false when the
    /// query is not cacheable.
    pub async fn put(
        &self,
        query: &str,
        payload: Value,
        location_override: Option<&LocationOverride>,
    ) -> bool {
        let (category, normalized) = extract_semantic_intent(query);
        if !is_cacheable(category, query) {
            return false;
        }

        let ttl_seconds = category.ttl_seconds();
        let key = cache_key(&normalized, location_override);
        let entry = CachedEntry {
            payload,
            meta: CacheMetadata {
                category,
                normalized_query: normalized,
                stored_at: Utc::now(),
                ttl_seconds,
            },
        };

        self.store
            .set(&key, entry, Duration::from_secs(ttl_seconds))
            .await;
        tracing::info!(
            category = category.as_str(),
            key = %key,
            ttl_seconds,
            "semantic cache stored"
        );
        true
    }

    /// Invalidate by category (prefix of the normalised query) or, with
    /// `None`, the whole semantic namespace.
    pub async fn invalidate(&self, category: Option<CacheCategory>) -> usize {
        let prefix = match category {
            Some(c) => format!("semantic:{}_", c.as_str()),
            None => "semantic:".to_string(),
        };
        let count = self.store.delete_prefix(&prefix).await;
        tracing::info!(prefix = %prefix, count, "semantic cache invalidated");
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_roundtrip_hit() {
        let cache = SemanticCache::in_memory();
        let stored = cache
            .put("what's the weather", json!({"answer": "Sunny, 72."}), None)
            .await;
        assert!(stored);

        // A different phrasing of the same question hits the same entry.
        let hit = cache.get("how's the weather", None).await;
        assert_eq!(hit.unwrap()["answer"], "Sunny, 72.");
    }

    #[tokio::test]
    async fn test_location_sensitive_dining() {
        let cache = SemanticCache::in_memory();
        cache
            .put(
                "good greek place near me",
                json!({"answer": "Try Samos in Greektown."}),
                None,
            )
            .await;

        // The Philly query must not see the Baltimore answer.
        assert!(cache.get("good greek place in philly", None).await.is_none());
        // The original query still hits.
        assert!(cache.get("good greek place near me", None).await.is_some());
    }

    #[tokio::test]
    async fn test_never_cache_followup() {
        let cache = SemanticCache::in_memory();
        let stored = cache
            .put("tell me more about the first one", json!({"answer": "..."}), None)
            .await;
        assert!(!stored);
        assert!(cache
            .get("tell me more about the first one", None)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_control_queries_never_written() {
        let cache = SemanticCache::in_memory();
        assert!(!cache.put("turn off the lights", json!({"ok": true}), None).await);
    }

    #[tokio::test]
    async fn test_expired_entries_are_absent() {
        let store = Arc::new(InMemoryCacheStore::new());
        let entry = CachedEntry {
            payload: json!({"answer": "stale"}),
            meta: CacheMetadata {
                category: CacheCategory::Stocks,
                normalized_query: "stocks_aapl".into(),
                stored_at: Utc::now(),
                ttl_seconds: 0,
            },
        };
        store.set("semantic:stocks_aapl", entry, Duration::ZERO).await;
        assert!(store.get("semantic:stocks_aapl").await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_by_category() {
        let cache = SemanticCache::in_memory();
        cache.put("what's the weather", json!({"a": 1}), None).await;
        cache.put("nfl standings", json!({"a": 2}), None).await;

        let removed = cache.invalidate(Some(CacheCategory::Weather)).await;
        assert_eq!(removed, 1);
        assert!(cache.get("what's the weather", None).await.is_none());
        assert!(cache.get("nfl standings", None).await.is_some());
    }

    #[tokio::test]
    async fn test_last_writer_wins() {
        let cache = SemanticCache::in_memory();
        cache.put("what's the weather", json!({"v": 1}), None).await;
        cache.put("what's the weather", json!({"v": 2}), None).await;
        assert_eq!(cache.get("what's the weather", None).await.unwrap()["v"], 2);
    }
}
