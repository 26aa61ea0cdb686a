use thiserror::Error;

pub type Result<T> = std::result::Result<T, PredictionError>;

#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("wrong predictor for entity type {0}")]
    WrongEntityType(String),

    #[error("resolution_seconds must be positive, got {0}")]
    InvalidResolution(i64),

    #[error("malformed TLE: {0}")]
    MalformedTle(String),

    #[error("earth-2 gateway request failed: {0}")]
    Earth2Unavailable(#[from] reqwest::Error),

    #[error("prediction store error: {0}")]
    Store(#[from] tokio_postgres::Error),

    #[error("prediction store pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("prediction store pool could not be created: {0}")]
    CreatePool(#[from] deadpool_postgres::CreatePoolError),

    #[error("corrupt prediction store row: {0}")]
    CorruptRow(String),
}

impl PredictionError {
    pub fn wrong_entity_type(got: impl Into<String>) -> Self {
        Self::WrongEntityType(got.into())
    }

    pub fn malformed_tle(msg: impl Into<String>) -> Self {
        Self::MalformedTle(msg.into())
    }

    pub fn corrupt_row(msg: impl Into<String>) -> Self {
        Self::CorruptRow(msg.into())
    }
}
