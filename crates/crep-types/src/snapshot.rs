use crate::entity::EntityType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Index record for one `(entity_type, hour)` bucket file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub bucket_start_ms: i64,
    pub bucket_end_ms: i64,
    pub entry_count: usize,
    pub file_size: u64,
    pub created_at: DateTime<Utc>,
    pub file_path: String,
}

/// `(entity_type, hour)` key, e.g. `"aircraft/2026-07-27/14"`.
pub fn bucket_key(entity_type: EntityType, bucket_start_ms: i64) -> String {
    let dt = DateTime::from_timestamp_millis(bucket_start_ms).unwrap_or_else(Utc::now);
    format!("{}/{}", entity_type, dt.format("%Y-%m-%d/%H"))
}

/// Stride of one snapshot bucket, in milliseconds (one hour, fixed).
pub const BUCKET_STRIDE_MS: i64 = 3_600_000;

/// Floors a timestamp to the start of its containing bucket.
pub fn bucket_start(timestamp_ms: i64) -> i64 {
    timestamp_ms.div_euclid(BUCKET_STRIDE_MS) * BUCKET_STRIDE_MS
}
