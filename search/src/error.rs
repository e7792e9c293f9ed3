//! Error types for the tender search core.

use thiserror::Error;

use tender_embeddings::EmbeddingError;

/// Result type alias for search operations.
pub type Result<T> = std::result::Result<T, SearchError>;

/// Errors that can occur while building, persisting, or querying a partition.
#[derive(Error, Debug)]
pub enum SearchError {
    /// No source records for the requested fiscal year.
    #[error("no tenders found for financial year {year}")]
    EmptyPartition { year: String },

    /// No saved partition for the requested fiscal year.
    #[error("no saved partition for financial year {year}")]
    NotFound { year: String },

    /// Persisted artifacts are inconsistent with each other.
    #[error("corrupt partition for financial year {year}: {reason}")]
    CorruptPartition { year: String, reason: String },

    /// Saved vectors were composed with a different text layout.
    #[error(
        "partition for financial year {year} was built with text composer v{stored}, current is v{current}"
    )]
    StalePartition {
        year: String,
        stored: u32,
        current: u32,
    },

    /// Query or index vectors disagree on dimension.
    #[error(
        "dimension mismatch for financial year {year}: partition has {expected}, provider produced {actual}"
    )]
    DimensionMismatch {
        year: String,
        expected: usize,
        actual: usize,
    },

    /// The embedding provider failed.
    #[error("embedding provider failed during {operation}: {source}")]
    Provider {
        operation: String,
        #[source]
        source: EmbeddingError,
    },

    /// A source record could not be normalized.
    #[error("invalid tender record: {0}")]
    InvalidRecord(String),

    /// A search was issued before any fiscal year was selected.
    #[error("no financial year selected")]
    NoActivePartition,

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// CSV error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SearchError {
    /// Wrap a provider failure with the operation that triggered it.
    pub fn provider(operation: impl Into<String>, source: EmbeddingError) -> Self {
        Self::Provider {
            operation: operation.into(),
            source,
        }
    }

    /// Whether rebuilding the partition from source records resolves this error.
    pub fn is_recoverable_by_rebuild(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::CorruptPartition { .. }
                | Self::StalePartition { .. }
                | Self::DimensionMismatch { .. }
        )
    }
}
