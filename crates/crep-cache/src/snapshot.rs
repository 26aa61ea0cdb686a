use crate::config::SnapshotConfig;
use crate::error::{CacheError, Result};
use chrono::Utc;
use crep_types::{bucket_key, bucket_start, EntityType, SnapshotMetadata, TimelineEntry, BUCKET_STRIDE_MS};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{error, warn};

const INDEX_FILE_NAME: &str = "index";

/// Durable compressed time-bucket files on disk, one per
/// `(entity_type, hour)`, with an in-memory index of available
/// buckets mirrored to `<root>/index`.
pub struct SnapshotStore {
    config: SnapshotConfig,
    index: Mutex<HashMap<String, SnapshotMetadata>>,
}

impl SnapshotStore {
    pub async fn new(config: SnapshotConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&config.root).await?;
        let index = load_index(&config.root).await.unwrap_or_else(|err| {
            warn!(error = %err, "snapshot index missing or corrupt, starting empty");
            HashMap::new()
        });
        Ok(Self {
            config,
            index: Mutex::new(index),
        })
    }

    fn bucket_file_path(&self, entity_type: EntityType, bucket_start_ms: i64) -> PathBuf {
        let dt = chrono::DateTime::from_timestamp_millis(bucket_start_ms).unwrap_or_else(Utc::now);
        self.config
            .root
            .join(entity_type.as_str())
            .join(dt.format("%Y-%m-%d").to_string())
            .join(format!("{}.bin", dt.format("%H")))
    }

    /// Serializes and writes a bucket file atomically (write-to-temp,
    /// rename), then updates the index. Replaces any existing bucket
    /// for the same key.
    pub async fn create_snapshot(
        &self,
        entity_type: EntityType,
        entries: Vec<TimelineEntry>,
        bucket_start_ms: i64,
    ) -> Result<SnapshotMetadata> {
        let aligned_start = bucket_start(bucket_start_ms);
        let key = bucket_key(entity_type, aligned_start);
        let path = self.bucket_file_path(entity_type, aligned_start);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec(&entries)?;
        let compressed = gzip_compress(&json)?;
        let file_size = compressed.len() as u64;

        let tmp_path = path.with_extension("bin.tmp");
        tokio::fs::write(&tmp_path, &compressed).await.map_err(|err| {
            error!(error = %err, bucket = %key, "snapshot write failed");
            CacheError::from(err)
        })?;
        tokio::fs::rename(&tmp_path, &path).await?;

        let metadata = SnapshotMetadata {
            bucket_start_ms: aligned_start,
            bucket_end_ms: aligned_start + BUCKET_STRIDE_MS - 1,
            entry_count: entries.len(),
            file_size,
            created_at: Utc::now(),
            file_path: path.to_string_lossy().to_string(),
        };

        {
            let mut index = self.index.lock().await;
            index.insert(key, metadata.clone());
            persist_index(&self.config.root, &index).await?;
        }

        Ok(metadata)
    }

    /// Returns the bucket's entries in storage order. A missing bucket,
    /// or any I/O/deserialization failure, degrades to an empty list —
    /// reads never fail loudly (SPEC_FULL §7).
    pub async fn read_snapshot(&self, bucket_key: &str) -> Vec<TimelineEntry> {
        let path = {
            let index = self.index.lock().await;
            match index.get(bucket_key) {
                Some(meta) => PathBuf::from(&meta.file_path),
                None => return Vec::new(),
            }
        };

        match tokio::fs::read(&path).await {
            Ok(compressed) => match gzip_decompress(&compressed).and_then(|json| {
                serde_json::from_slice::<Vec<TimelineEntry>>(&json).map_err(CacheError::from)
            }) {
                Ok(entries) => entries,
                Err(err) => {
                    warn!(error = %err, bucket = bucket_key, "snapshot bucket unreadable, degrading to empty");
                    Vec::new()
                }
            },
            Err(err) => {
                warn!(error = %err, bucket = bucket_key, "snapshot file missing on disk, degrading to empty");
                Vec::new()
            }
        }
    }

    /// Reads every bucket overlapping `[start_ms, end_ms]` at the fixed
    /// bucket stride and concatenates, in bucket order, the entries
    /// whose `timestamp_ms` falls exactly within the requested range.
    pub async fn query_snapshots(&self, entity_type: EntityType, start_ms: i64, end_ms: i64) -> Vec<TimelineEntry> {
        let mut results = Vec::new();
        let mut cursor = bucket_start(start_ms);
        let last_bucket = bucket_start(end_ms.max(start_ms));

        while cursor <= last_bucket {
            let key = bucket_key(entity_type, cursor);
            let entries = self.read_snapshot(&key).await;
            results.extend(
                entries
                    .into_iter()
                    .filter(|e| e.timestamp_ms >= start_ms && e.timestamp_ms <= end_ms),
            );
            cursor += BUCKET_STRIDE_MS;
        }

        results
    }

    /// Removes buckets whose `bucket_end_ms < now - max_age_ms`.
    pub async fn cleanup(&self, max_age_ms: i64) -> Result<usize> {
        let threshold = Utc::now().timestamp_millis() - max_age_ms;
        let mut index = self.index.lock().await;

        let stale: Vec<String> = index
            .iter()
            .filter(|(_, meta)| meta.bucket_end_ms < threshold)
            .map(|(k, _)| k.clone())
            .collect();

        let mut removed = 0usize;
        for key in stale {
            if let Some(meta) = index.remove(&key) {
                if let Err(err) = tokio::fs::remove_file(&meta.file_path).await {
                    warn!(error = %err, bucket = %key, "failed to remove stale snapshot file");
                } else {
                    removed += 1;
                }
            }
        }

        persist_index(&self.config.root, &index).await?;
        Ok(removed)
    }
}

fn gzip_compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn gzip_decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

async fn load_index(root: &std::path::Path) -> Result<HashMap<String, SnapshotMetadata>> {
    let path = root.join(INDEX_FILE_NAME);
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
        Err(err) => Err(CacheError::from(err)),
    }
}

async fn persist_index(root: &std::path::Path, index: &HashMap<String, SnapshotMetadata>) -> Result<()> {
    let path = root.join(INDEX_FILE_NAME);
    let tmp_path = root.join(format!("{INDEX_FILE_NAME}.tmp"));
    let json = serde_json::to_vec_pretty(index)?;
    tokio::fs::write(&tmp_path, json).await?;
    tokio::fs::rename(&tmp_path, &path).await?;
    Ok(())
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
            source: Source::Historical,
            created_at: Utc::now(),
            expires_at: None,
        }
    }

    async fn store_in(dir: &tempfile::TempDir) -> SnapshotStore {
        let config = SnapshotConfig {
            root: dir.path().to_path_buf(),
            max_local_snapshots: 168,
        };
        SnapshotStore::new(config).await.unwrap()
    }

    #[tokio::test]
    async fn create_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        let bucket_start_ms = bucket_start(1_700_000_000_000);
        let entries = vec![sample_entry("N1", bucket_start_ms + 1000)];
        let meta = store
            .create_snapshot(EntityType::Aircraft, entries.clone(), bucket_start_ms)
            .await
            .unwrap();

        assert_eq!(meta.entry_count, 1);
        assert!(std::path::Path::new(&meta.file_path).exists());

        let key = bucket_key(EntityType::Aircraft, bucket_start_ms);
        let read_back = store.read_snapshot(&key).await;
        assert_eq!(read_back.len(), 1);
        assert_eq!(read_back[0].entity_id, "N1");
    }

    #[tokio::test]
    async fn read_missing_bucket_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        let entries = store.read_snapshot("aircraft/2026-01-01/00").await;
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn query_snapshots_filters_to_exact_range() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        let bucket_start_ms = bucket_start(1_700_000_000_000);
        let entries = vec![
            sample_entry("N1", bucket_start_ms + 100),
            sample_entry("N2", bucket_start_ms + 200_000),
        ];
        store
            .create_snapshot(EntityType::Aircraft, entries, bucket_start_ms)
            .await
            .unwrap();

        let results = store
            .query_snapshots(EntityType::Aircraft, bucket_start_ms, bucket_start_ms + 1000)
            .await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].entity_id, "N1");
    }

    #[tokio::test]
    async fn cleanup_removes_stale_buckets() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir).await;
        let old_bucket_start = bucket_start(Utc::now().timestamp_millis()) - 10 * BUCKET_STRIDE_MS;
        store
            .create_snapshot(EntityType::Aircraft, vec![sample_entry("N1", old_bucket_start)], old_bucket_start)
            .await
            .unwrap();

        let removed = store.cleanup(BUCKET_STRIDE_MS).await.unwrap();
        assert_eq!(removed, 1);
    }
}
