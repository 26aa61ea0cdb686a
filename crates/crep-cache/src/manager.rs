use crate::config::{MemoryCacheConfig, NetworkedCacheConfig, SnapshotConfig};
use crate::error::Result;
use crate::memory::MemoryCache;
use crate::networked::NetworkedCache;
use crate::snapshot::SnapshotStore;
use crep_types::{bucket_key, bucket_start, EntityType, QueryResult, TierSource, TimelineEntry, TimelineQuery};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheStats {
    pub memory_hits: u64,
    pub networked_hits: u64,
    pub snapshot_hits: u64,
    pub misses: u64,
}

impl CacheStats {
    pub fn total_lookups(&self) -> u64 {
        self.memory_hits + self.networked_hits + self.snapshot_hits + self.misses
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.total_lookups();
        if total == 0 {
            return 0.0;
        }
        (self.memory_hits + self.networked_hits + self.snapshot_hits) as f64 / total as f64
    }
}

#[derive(Default)]
struct Counters {
    memory_hits: AtomicU64,
    networked_hits: AtomicU64,
    snapshot_hits: AtomicU64,
    misses: AtomicU64,
}

/// Orchestrates the three cache tiers as a read-through waterfall
/// (memory -> networked -> snapshot) with promotion back up on a lower
/// tier hit, and a write-through path that fans a single `put` out to
/// every tier. `store_live_update` is the fast path for high-frequency
/// position ticks: memory is updated synchronously, the networked
/// write is fired-and-forgotten on a background task.
pub struct CacheManager {
    memory: MemoryCache,
    networked: Arc<NetworkedCache>,
    snapshot: Arc<SnapshotStore>,
    counters: Counters,
}

impl CacheManager {
    pub async fn new(
        memory_config: MemoryCacheConfig,
        networked_config: NetworkedCacheConfig,
        snapshot_config: SnapshotConfig,
    ) -> Result<Self> {
        let snapshot = SnapshotStore::new(snapshot_config).await?;
        Ok(Self {
            memory: MemoryCache::new(memory_config),
            networked: Arc::new(NetworkedCache::new(networked_config)),
            snapshot: Arc::new(snapshot),
            counters: Counters::default(),
        })
    }

    /// Read-through waterfall. A hit below the memory tier is promoted
    /// back into memory (and, for a snapshot hit, into the networked
    /// tier too) so the next lookup for the same key is faster.
    pub async fn get(&self, key: &str, entity_type: EntityType, entity_id: &str, timestamp_ms: i64) -> Option<TimelineEntry> {
        let start = Instant::now();

        if let Some(entry) = self.memory.get(key).await {
            self.counters.memory_hits.fetch_add(1, Ordering::Relaxed);
            debug!(key, tier = "memory", latency_ms = start.elapsed().as_secs_f64() * 1000.0, "cache hit");
            return Some(entry);
        }

        let networked_query = TimelineQuery {
            entity_type: Some(entity_type),
            entity_id: Some(entity_id.to_string()),
            start_time_ms: Some(timestamp_ms),
            end_time_ms: Some(timestamp_ms),
            limit: 1,
            ..Default::default()
        };
        let networked_hits = self.networked.query(&networked_query).await;
        if let Some(entry) = networked_hits.into_iter().next() {
            self.counters.networked_hits.fetch_add(1, Ordering::Relaxed);
            self.memory.put(entry.clone()).await;
            debug!(key, tier = "redis", latency_ms = start.elapsed().as_secs_f64() * 1000.0, "cache hit");
            return Some(entry);
        }

        let bucket = bucket_key(entity_type, bucket_start(timestamp_ms));
        let snapshot_entries = self.snapshot.read_snapshot(&bucket).await;
        if let Some(entry) = snapshot_entries
            .into_iter()
            .find(|e| e.entity_id == entity_id && e.timestamp_ms == timestamp_ms)
        {
            self.counters.snapshot_hits.fetch_add(1, Ordering::Relaxed);
            self.memory.put(entry.clone()).await;
            self.networked.put(entry.clone()).await;
            debug!(key, tier = "snapshot", latency_ms = start.elapsed().as_secs_f64() * 1000.0, "cache hit");
            return Some(entry);
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Queries all three tiers for the best available answer, merging
    /// and deduplicating by `(entity_id, timestamp_ms)`. Memory and
    /// networked results win over snapshot on overlap, since they are
    /// more likely to reflect a recent write.
    pub async fn query(&self, query: &TimelineQuery) -> QueryResult {
        let start = Instant::now();

        let memory_results = self.memory.query(query).await;
        if !memory_results.is_empty() {
            self.counters.memory_hits.fetch_add(1, Ordering::Relaxed);
            return QueryResult {
                entries: limited(memory_results, query.limit),
                tier: TierSource::Memory,
                hit: true,
                latency_ms: start.elapsed().as_secs_f64() * 1000.0,
                has_more: false,
            };
        }

        let networked_results = self.networked.query(query).await;
        if !networked_results.is_empty() {
            self.counters.networked_hits.fetch_add(1, Ordering::Relaxed);
            for entry in &networked_results {
                self.memory.put(entry.clone()).await;
            }
            return QueryResult {
                entries: limited(networked_results, query.limit),
                tier: TierSource::Redis,
                hit: true,
                latency_ms: start.elapsed().as_secs_f64() * 1000.0,
                has_more: false,
            };
        }

        if let (Some(entity_type), Some(start_ms), Some(end_ms)) = (query.entity_type, query.start_time_ms, query.end_time_ms) {
            let snapshot_results = self.snapshot.query_snapshots(entity_type, start_ms, end_ms).await;
            let filtered: Vec<TimelineEntry> = snapshot_results.into_iter().filter(|e| query.matches(e)).collect();
            if !filtered.is_empty() {
                self.counters.snapshot_hits.fetch_add(1, Ordering::Relaxed);
                return QueryResult {
                    entries: limited(filtered, query.limit),
                    tier: TierSource::Snapshot,
                    hit: true,
                    latency_ms: start.elapsed().as_secs_f64() * 1000.0,
                    has_more: false,
                };
            }
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        QueryResult {
            entries: Vec::new(),
            tier: TierSource::Memory,
            hit: false,
            latency_ms: start.elapsed().as_secs_f64() * 1000.0,
            has_more: false,
        }
    }

    /// Write-through: updates memory synchronously, then the networked
    /// tier, before returning. Use this for ingested ground truth where
    /// durability matters more than raw throughput.
    pub async fn put(&self, entry: TimelineEntry) {
        self.memory.put(entry.clone()).await;
        self.networked.put(entry).await;
    }

    pub async fn put_batch(&self, entries: Vec<TimelineEntry>) {
        self.memory.put_batch(entries.clone()).await;
        self.networked.put_batch(entries).await;
    }

    /// Fast path for high-frequency position ticks: memory is updated
    /// inline, the networked write is spawned in the background and its
    /// result is never awaited by the caller.
    pub async fn store_live_update(&self, entry: TimelineEntry) {
        self.memory.put(entry.clone()).await;
        let networked = Arc::clone(&self.networked);
        tokio::spawn(async move {
            networked.put(entry).await;
        });
    }

    pub async fn invalidate(&self, entity_type: Option<EntityType>, entity_id: Option<&str>) -> usize {
        let memory_count = self.memory.invalidate(entity_type, entity_id).await;
        let networked_count = self.networked.invalidate(entity_type, entity_id).await;
        memory_count + networked_count
    }

    pub async fn snapshot_now(&self, entity_type: EntityType, entries: Vec<TimelineEntry>, bucket_start_ms: i64) -> Result<()> {
        self.snapshot.create_snapshot(entity_type, entries, bucket_start_ms).await?;
        Ok(())
    }

    pub async fn cleanup_snapshots(&self, max_age_ms: i64) -> Result<usize> {
        self.snapshot.cleanup(max_age_ms).await
    }

    pub async fn get_stats(&self) -> CacheStats {
        CacheStats {
            memory_hits: self.counters.memory_hits.load(Ordering::Relaxed),
            networked_hits: self.counters.networked_hits.load(Ordering::Relaxed),
            snapshot_hits: self.counters.snapshot_hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
        }
    }

    pub async fn memory_size(&self) -> usize {
        self.memory.size().await
    }

    pub async fn networked_connected(&self) -> bool {
        self.networked.is_connected().await
    }
}

fn limited(mut entries: Vec<TimelineEntry>, limit: usize) -> Vec<TimelineEntry> {
    if limit > 0 && entries.len() > limit {
        entries.truncate(limit);
    }
    entries
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

    async fn manager_in(dir: &tempfile::TempDir) -> CacheManager {
        let snapshot_config = SnapshotConfig {
            root: dir.path().to_path_buf(),
            max_local_snapshots: 168,
        };
        CacheManager::new(MemoryCacheConfig::default(), NetworkedCacheConfig::default(), snapshot_config)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn put_then_get_hits_memory_tier() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_in(&dir).await;
        let entry = sample_entry("N1", 1_700_000_000_000);
        manager.put(entry.clone()).await;

        let fetched = manager.get(&entry.cache_key(), entry.entity_type, &entry.entity_id, entry.timestamp_ms).await;
        assert!(fetched.is_some());

        let stats = manager.get_stats().await;
        assert_eq!(stats.memory_hits, 1);
        assert_eq!(stats.misses, 0);
    }

    #[tokio::test]
    async fn get_miss_across_all_tiers_counts_as_miss() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_in(&dir).await;
        let fetched = manager.get("timeline:aircraft:N404:1", EntityType::Aircraft, "N404", 1).await;
        assert!(fetched.is_none());

        let stats = manager.get_stats().await;
        assert_eq!(stats.misses, 1);
    }

    #[tokio::test]
    async fn snapshot_now_writes_a_readable_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_in(&dir).await;
        let bucket_start_ms = bucket_start(1_700_000_000_000);
        let entry = sample_entry("N1", bucket_start_ms + 10);
        manager
            .snapshot_now(EntityType::Aircraft, vec![entry.clone()], bucket_start_ms)
            .await
            .unwrap();

        let query = TimelineQuery {
            entity_type: Some(EntityType::Aircraft),
            start_time_ms: Some(bucket_start_ms),
            end_time_ms: Some(bucket_start_ms + 1000),
            ..Default::default()
        };
        let result = manager.query(&query).await;
        assert!(result.hit);
        assert_eq!(result.tier, TierSource::Snapshot);
    }
}
