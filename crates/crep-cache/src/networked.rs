use crate::config::NetworkedCacheConfig;
use crep_types::{cache_key, index_key, EntityType, Source, TimelineEntry, TimelineQuery};
use futures::StreamExt;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkedCacheStats {
    pub connected: bool,
    pub total_keys: u64,
    pub used_memory_bytes: Option<u64>,
}

/// Distributed key/value tier backed by a Redis-compatible store. Best
/// effort: an unreachable backend degrades to no-op reads/writes and
/// `connected=false` rather than propagating an error, so the Cache
/// Manager can fall through to the next tier.
pub struct NetworkedCache {
    config: NetworkedCacheConfig,
    client: redis::Client,
    connection: Mutex<Option<redis::aio::MultiplexedConnection>>,
}

impl NetworkedCache {
    pub fn new(config: NetworkedCacheConfig) -> Self {
        let client = redis::Client::open(config.url.clone())
            .expect("redis URL must parse; malformed URLs are a startup-time config error");
        Self {
            config,
            client,
            connection: Mutex::new(None),
        }
    }

    /// Idempotent, best-effort connect. Returns whether a usable
    /// connection is now held.
    pub async fn connect(&self) -> bool {
        let mut guard = self.connection.lock().await;
        if guard.is_some() {
            return true;
        }
        match self.client.get_multiplexed_tokio_connection().await {
            Ok(conn) => {
                *guard = Some(conn);
                true
            }
            Err(err) => {
                warn!(error = %err, "networked cache unreachable");
                false
            }
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.lock().await.is_some()
    }

    async fn conn(&self) -> Option<redis::aio::MultiplexedConnection> {
        if !self.connect().await {
            return None;
        }
        self.connection.lock().await.clone()
    }

    pub async fn put(&self, entry: TimelineEntry) {
        self.put_batch(vec![entry]).await;
    }

    pub async fn put_batch(&self, entries: Vec<TimelineEntry>) {
        let Some(mut conn) = self.conn().await else {
            return;
        };
        let ttl = self.config.entry_ttl.as_secs();

        let mut pipe = redis::pipe();
        for entry in &entries {
            let payload = match serde_json::to_string(entry) {
                Ok(p) => p,
                Err(err) => {
                    warn!(error = %err, "failed to serialize timeline entry for networked cache");
                    continue;
                }
            };
            let ekey = entry.cache_key();
            let ikey = index_key(entry.entity_type, &entry.entity_id);
            pipe.cmd("SET")
                .arg(&ekey)
                .arg(payload)
                .arg("EX")
                .arg(ttl)
                .ignore();
            pipe.cmd("ZADD").arg(&ikey).arg(entry.timestamp_ms as f64).arg(&ekey).ignore();
            pipe.cmd("EXPIRE").arg(&ikey).arg(ttl).ignore();
        }

        if let Err(err) = pipe.query_async::<_, ()>(&mut conn).await {
            warn!(error = %err, "networked cache write failed; tiers below remain authoritative");
        }
    }

    pub async fn query(&self, query: &TimelineQuery) -> Vec<TimelineEntry> {
        let Some(mut conn) = self.conn().await else {
            return Vec::new();
        };

        let index_keys = self.resolve_index_keys(&mut conn, query).await;
        let min = query.start_time_ms.map(|v| v.to_string()).unwrap_or_else(|| "-inf".to_string());
        let max = query.end_time_ms.map(|v| v.to_string()).unwrap_or_else(|| "+inf".to_string());

        let mut entry_keys: Vec<String> = Vec::new();
        for ikey in index_keys {
            match conn
                .zrangebyscore::<_, _, _, Vec<String>>(&ikey, min.clone(), max.clone())
                .await
            {
                Ok(mut keys) => entry_keys.append(&mut keys),
                Err(err) => warn!(error = %err, index = %ikey, "networked cache index scan failed"),
            }
        }

        if entry_keys.is_empty() {
            return Vec::new();
        }

        let payloads: Vec<Option<String>> = match conn.mget(&entry_keys).await {
            Ok(p) => p,
            Err(err) => {
                warn!(error = %err, "networked cache batch fetch failed");
                return Vec::new();
            }
        };

        let mut results: Vec<TimelineEntry> = payloads
            .into_iter()
            .flatten()
            .filter_map(|payload| match serde_json::from_str::<TimelineEntry>(&payload) {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!(error = %err, "networked cache entry deserialization failed");
                    None
                }
            })
            .filter(|entry| query.source.map_or(true, |s| entry.source == s))
            .collect();

        if query.limit > 0 && results.len() > query.limit {
            results.truncate(query.limit);
        }
        results
    }

    async fn resolve_index_keys(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        query: &TimelineQuery,
    ) -> Vec<String> {
        match (query.entity_type, &query.entity_id) {
            (Some(et), Some(id)) => vec![index_key(et, id)],
            (Some(et), None) => self.scan_keys(conn, &format!("timeline:idx:{et}:*")).await,
            (None, _) => self.scan_keys(conn, "timeline:idx:*").await,
        }
    }

    /// Pattern-scan via `SCAN`, never blocking `KEYS`. O(total keys) —
    /// a known scalability limitation at large key counts, flagged in
    /// SPEC_FULL §9 rather than fixed here.
    async fn scan_keys(&self, conn: &mut redis::aio::MultiplexedConnection, pattern: &str) -> Vec<String> {
        let iter: redis::AsyncIter<String> = match conn.scan_match(pattern).await {
            Ok(it) => it,
            Err(err) => {
                warn!(error = %err, pattern, "networked cache scan failed");
                return Vec::new();
            }
        };
        iter.collect().await
    }

    pub async fn invalidate(&self, entity_type: Option<EntityType>, entity_id: Option<&str>) -> usize {
        let Some(mut conn) = self.conn().await else {
            return 0;
        };

        let index_keys = match (entity_type, entity_id) {
            (Some(et), Some(id)) => vec![index_key(et, id)],
            (Some(et), None) => self.scan_keys(&mut conn, &format!("timeline:idx:{et}:*")).await,
            (None, None) => self.scan_keys(&mut conn, "timeline:idx:*").await,
            (None, Some(_)) => self.scan_keys(&mut conn, "timeline:idx:*").await,
        };

        let mut total = 0usize;
        for ikey in index_keys {
            let members: Vec<String> = conn.zrange(&ikey, 0, -1).await.unwrap_or_default();
            if !members.is_empty() {
                let _: redis::RedisResult<()> = conn.del(&members).await;
                total += members.len();
            }
            let _: redis::RedisResult<()> = conn.del(&ikey).await;
        }
        debug!(count = total, "networked cache invalidation complete");
        total
    }

    pub async fn get_stats(&self) -> NetworkedCacheStats {
        let Some(mut conn) = self.conn().await else {
            return NetworkedCacheStats {
                connected: false,
                total_keys: 0,
                used_memory_bytes: None,
            };
        };

        let total_keys: u64 = redis::cmd("DBSIZE")
            .query_async(&mut conn)
            .await
            .unwrap_or(0);
        let used_memory_bytes = redis::cmd("INFO")
            .arg("memory")
            .query_async::<_, String>(&mut conn)
            .await
            .ok()
            .and_then(|info| parse_used_memory(&info));

        NetworkedCacheStats {
            connected: true,
            total_keys,
            used_memory_bytes,
        }
    }

    /// Ground-truth entries whose `source` is `Source::Live` or
    /// `Source::Historical` must never be overwritten by a `forecast`
    /// write at tier promotion time; callers enforce that at the
    /// Cache Manager layer (SPEC_FULL §3 invariant 3), not here.
    pub fn source_is_ground_truth(source: Source) -> bool {
        source.is_ground_truth()
    }
}

fn parse_used_memory(info: &str) -> Option<u64> {
    info.lines()
        .find_map(|line| line.strip_prefix("used_memory:"))
        .and_then(|v| v.trim().parse().ok())
}
