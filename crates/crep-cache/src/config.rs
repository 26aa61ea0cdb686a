use std::time::Duration;

/// `SNAPSHOT_DIR` default, mirrored from the reference service.
pub const DEFAULT_SNAPSHOT_DIR: &str = "/tmp/crep-snapshots";

/// `REDIS_URL` default.
pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379/0";

#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    pub root: std::path::PathBuf,
    /// Hourly buckets retained before `cleanup` removes them (default:
    /// one week).
    pub max_local_snapshots: i64,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            root: std::env::var("SNAPSHOT_DIR")
                .unwrap_or_else(|_| DEFAULT_SNAPSHOT_DIR.to_string())
                .into(),
            max_local_snapshots: 168,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MemoryCacheConfig {
    pub max_entries: usize,
    pub ttl: Duration,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            ttl: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NetworkedCacheConfig {
    pub url: String,
    pub entry_ttl: Duration,
}

impl Default for NetworkedCacheConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("REDIS_URL").unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string()),
            entry_ttl: Duration::from_secs(86_400),
        }
    }
}
