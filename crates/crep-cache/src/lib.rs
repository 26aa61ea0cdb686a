//! Three-tier timeline cache: a bounded in-process LRU, a Redis-backed
//! networked tier, and gzip-compressed hourly snapshot files on disk.
//! [`CacheManager`] is the entry point; the individual tiers are public
//! for callers that need to bypass the waterfall (snapshot export jobs,
//! admin tooling).

mod config;
mod error;
mod manager;
mod memory;
mod networked;
mod snapshot;

pub use config::{MemoryCacheConfig, NetworkedCacheConfig, SnapshotConfig, DEFAULT_REDIS_URL, DEFAULT_SNAPSHOT_DIR};
pub use error::{CacheError, Result};
pub use manager::{CacheManager, CacheStats};
pub use memory::MemoryCache;
pub use networked::{NetworkedCache, NetworkedCacheStats};
pub use snapshot::SnapshotStore;
