use crate::config::MemoryCacheConfig;
use crep_types::{EntityType, TimelineEntry, TimelineQuery};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

struct Slot {
    entry: TimelineEntry,
    inserted_at: Instant,
}

/// Bounded per-process LRU of recent timeline entries. A single mutex
/// guards the map; no async I/O is ever held under it (SPEC_FULL §5).
pub struct MemoryCache {
    inner: Mutex<LruCache<String, Slot>>,
    ttl: Duration,
}

impl MemoryCache {
    pub fn new(config: MemoryCacheConfig) -> Self {
        let cap = NonZeroUsize::new(config.max_entries.max(1)).unwrap();
        Self {
            inner: Mutex::new(LruCache::new(cap)),
            ttl: config.ttl,
        }
    }

    fn is_expired(&self, slot: &Slot, now: Instant) -> bool {
        now.duration_since(slot.inserted_at) >= self.ttl || slot.entry.is_expired(chrono::Utc::now())
    }

    /// Returns the entry if present and unexpired; on hit it is
    /// promoted to the MRU end. Lazily evicts if found expired.
    pub async fn get(&self, key: &str) -> Option<TimelineEntry> {
        let mut guard = self.inner.lock().await;
        let now = Instant::now();
        let expired = match guard.get(key) {
            Some(slot) => self.is_expired(slot, now),
            None => return None,
        };
        if expired {
            guard.pop(key);
            debug!(key, "memory cache: lazily evicted expired entry");
            return None;
        }
        guard.get(key).map(|slot| slot.entry.clone())
    }

    pub async fn put(&self, entry: TimelineEntry) {
        let key = entry.cache_key();
        let mut guard = self.inner.lock().await;
        guard.put(
            key,
            Slot {
                entry,
                inserted_at: Instant::now(),
            },
        );
    }

    pub async fn put_batch(&self, entries: Vec<TimelineEntry>) {
        let mut guard = self.inner.lock().await;
        let now = Instant::now();
        for entry in entries {
            let key = entry.cache_key();
            guard.put(
                key,
                Slot {
                    entry,
                    inserted_at: now,
                },
            );
        }
    }

    pub async fn query(&self, query: &TimelineQuery) -> Vec<TimelineEntry> {
        let mut guard = self.inner.lock().await;
        let now = Instant::now();

        let expired_keys: Vec<String> = guard
            .iter()
            .filter(|(_, slot)| self.is_expired(slot, now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &expired_keys {
            guard.pop(key);
        }

        let mut results: Vec<TimelineEntry> = guard
            .iter()
            .map(|(_, slot)| slot.entry.clone())
            .filter(|entry| query.matches(entry))
            .collect();

        if query.limit > 0 && results.len() > query.limit {
            results.truncate(query.limit);
        }
        results
    }

    pub async fn invalidate(&self, entity_type: Option<EntityType>, entity_id: Option<&str>) -> usize {
        let mut guard = self.inner.lock().await;
        let to_remove: Vec<String> = guard
            .iter()
            .filter(|(_, slot)| {
                let entry = &slot.entry;
                entity_type.map_or(true, |et| entry.entity_type == et)
                    && entity_id.map_or(true, |id| entry.entity_id == id)
            })
            .map(|(k, _)| k.clone())
            .collect();

        let count = to_remove.len();
        for key in to_remove {
            guard.pop(&key);
        }
        count
    }

    pub async fn clear(&self) {
        self.inner.lock().await.clear();
    }

    pub async fn size(&self) -> usize {
        self.inner.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crep_types::{GeoPoint, Source};
    use serde_json::json;

    fn sample_entry(entity_id: &str, timestamp_ms: i64) -> TimelineEntry {
        TimelineEntry {
            entity_type: EntityType::Aircraft,
            entity_id: entity_id.to_string(),
            timestamp_ms,
            data: json!({"position": GeoPoint::new(47.6, -122.3)}),
            source: Source::Live,
            created_at: chrono::Utc::now(),
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let cache = MemoryCache::new(MemoryCacheConfig::default());
        let entry = sample_entry("N12345", 1_700_000_000_000);
        let key = entry.cache_key();
        cache.put(entry.clone()).await;
        let fetched = cache.get(&key).await.expect("entry should be present");
        assert_eq!(fetched.entity_id, entry.entity_id);
    }

    #[tokio::test]
    async fn capacity_evicts_oldest() {
        let mut config = MemoryCacheConfig::default();
        config.max_entries = 2;
        let cache = MemoryCache::new(config);
        cache.put(sample_entry("a", 1)).await;
        cache.put(sample_entry("b", 2)).await;
        cache.put(sample_entry("c", 3)).await;
        assert_eq!(cache.size().await, 2);
        assert!(cache.get(&sample_entry("a", 1).cache_key()).await.is_none());
    }

    #[tokio::test]
    async fn invalidate_by_entity_removes_matching_only() {
        let cache = MemoryCache::new(MemoryCacheConfig::default());
        cache.put(sample_entry("a", 1)).await;
        cache.put(sample_entry("b", 2)).await;
        let removed = cache.invalidate(None, Some("a")).await;
        assert_eq!(removed, 1);
        assert_eq!(cache.size().await, 1);
    }

    #[tokio::test]
    async fn query_respects_limit() {
        let cache = MemoryCache::new(MemoryCacheConfig::default());
        for i in 0..5 {
            cache.put(sample_entry("a", i)).await;
        }
        let query = TimelineQuery {
            entity_id: Some("a".to_string()),
            limit: 2,
            ..Default::default()
        };
        let results = cache.query(&query).await;
        assert_eq!(results.len(), 2);
    }
}
