use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),

    #[error("failed to encode cache entry: {0}")]
    Encode(#[from] serde_json::Error),
}
