use thiserror::Error;

pub type Result<T> = std::result::Result<T, CacheError>;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("networked cache error: {0}")]
    Networked(#[from] redis::RedisError),

    #[error("invalid bucket key: {0}")]
    InvalidBucketKey(String),

    #[error("snapshot index corrupt: {0}")]
    IndexCorrupt(String),
}

impl CacheError {
    pub fn invalid_bucket_key(msg: impl Into<String>) -> Self {
        Self::InvalidBucketKey(msg.into())
    }

    pub fn index_corrupt(msg: impl Into<String>) -> Self {
        Self::IndexCorrupt(msg.into())
    }
}
