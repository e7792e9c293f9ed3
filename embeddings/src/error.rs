//! Error types for embedding providers.

use thiserror::Error;

/// Result type alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Errors raised while turning text into vectors.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// No API key for a remote provider.
    #[error("embedding provider not configured")]
    ProviderNotConfigured,

    /// The provider answered with a non-success status.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// The provider answered, but not with embeddings.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// A batch came back with a different number of vectors than inputs.
    #[error("{requested} texts produced {returned} embeddings")]
    CountMismatch { requested: usize, returned: usize },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// An embedding contained NaN or infinity.
    #[error("embedding {index} contains non-finite values")]
    NonFinite { index: usize },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}
