pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("dataset record {index}: {reason}")]
    Schema { index: usize, reason: String },

    #[error("embedding provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("embedding for `{doc_id}` has dimension {actual}, expected {expected}")]
    DimensionMismatch {
        doc_id: String,
        expected: usize,
        actual: usize,
    },

    #[error("no index is ready; build the collection first")]
    IndexNotReady,

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("a rebuild is already in progress")]
    RebuildInProgress,
}
