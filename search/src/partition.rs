//! One fiscal year's records paired with their embeddings.

use tender_embeddings::{Embedding, EmbeddingProvider};

use crate::compose::COMPOSER_VERSION;
use crate::error::{Result, SearchError};
use crate::record::TenderRecord;

/// How a partition's vectors were produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionMeta {
    /// Provider name, e.g. `openai`.
    pub provider: String,

    /// Provider model identifier.
    pub model: String,

    /// Whether the provider guaranteed unit-length vectors.
    pub normalized: bool,

    /// Text composer version the vectors were computed from.
    pub composer_version: u32,
}

impl PartitionMeta {
    /// Describe vectors produced by `provider` with the current composer.
    pub fn for_provider(provider: &dyn EmbeddingProvider) -> Self {
        Self {
            provider: provider.name().to_string(),
            model: provider.model().to_string(),
            normalized: provider.normalizes(),
            composer_version: COMPOSER_VERSION,
        }
    }
}

/// The full record and vector set for one financial year.
///
/// `records[i]` is embedded by `vectors[i]`. Construction checks that the
/// two line up, that the set is non-empty, and that every vector has the
/// same dimension; a `Partition` is never modified afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    year: String,
    records: Vec<TenderRecord>,
    vectors: Vec<Embedding>,
    dimension: usize,
    meta: PartitionMeta,
}

impl Partition {
    pub fn new(
        year: impl Into<String>,
        records: Vec<TenderRecord>,
        vectors: Vec<Embedding>,
        meta: PartitionMeta,
    ) -> Result<Self> {
        let year = year.into();

        if records.is_empty() {
            return Err(SearchError::EmptyPartition { year });
        }

        if records.len() != vectors.len() {
            return Err(SearchError::CorruptPartition {
                reason: format!(
                    "{} records but {} vectors",
                    records.len(),
                    vectors.len()
                ),
                year,
            });
        }

        let dimension = vectors[0].len();
        if dimension == 0 {
            return Err(SearchError::CorruptPartition {
                year,
                reason: "vectors have zero dimension".to_string(),
            });
        }
        if let Some((i, v)) = vectors
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != dimension)
        {
            return Err(SearchError::CorruptPartition {
                reason: format!(
                    "vector {i} has dimension {}, expected {dimension}",
                    v.len()
                ),
                year,
            });
        }

        Ok(Self {
            year,
            records,
            vectors,
            dimension,
            meta,
        })
    }

    /// The financial year this partition covers.
    pub fn year(&self) -> &str {
        &self.year
    }

    pub fn records(&self) -> &[TenderRecord] {
        &self.records
    }

    pub fn vectors(&self) -> &[Embedding] {
        &self.vectors
    }

    /// Dimension shared by every vector.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn meta(&self) -> &PartitionMeta {
        &self.meta
    }

    /// Number of records (always equal to the number of vectors).
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
