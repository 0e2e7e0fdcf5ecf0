use thiserror::Error;

/// Errors produced by the ingestion and query pipeline
#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid chunking parameters, bad `k`, missing or malformed settings
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The vector index could not be reached or rejected the request
    #[error("vector index unavailable for collection '{collection}': {message}")]
    IndexUnavailable { collection: String, message: String },

    /// A vector's dimension differs from the one the collection was built with
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The collection was populated by a different embedder
    #[error(
        "collection '{collection}' was embedded with '{expected}', refusing to use '{actual}'"
    )]
    EmbeddingSpaceMismatch {
        collection: String,
        expected: String,
        actual: String,
    },

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("document error: {0}")]
    Document(String),
}

/// Failures of the generation capability. A query that hits one of these
/// yields no answer.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation timed out: {0}")]
    Timeout(String),

    #[error("generation quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("malformed generation response: {0}")]
    MalformedResponse(String),

    #[error("generation request failed: {status} {body}")]
    Provider { status: u16, body: String },
}

pub type Result<T> = std::result::Result<T, RagError>;
