//! Similarity search over one loaded partition.

use std::cmp::Reverse;
use std::sync::Arc;

use ordered_float::OrderedFloat;
use serde::Serialize;
use tracing::{debug, warn};

use tender_embeddings::{Embedding, EmbeddingProvider, cosine_similarity, dot_product};

use crate::error::{Result, SearchError};
use crate::partition::Partition;
use crate::record::TenderRecord;

/// How query and record vectors are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scoring {
    /// Plain dot product; equals cosine for unit-length vectors.
    Dot,
    /// Explicit cosine similarity, for providers that do not normalize.
    Cosine,
}

impl Scoring {
    /// Dot product only when both sides are known to be unit-length.
    pub fn select(partition_normalized: bool, provider_normalizes: bool) -> Self {
        if partition_normalized && provider_normalizes {
            Self::Dot
        } else {
            Self::Cosine
        }
    }

    fn score(self, record: &[f32], query: &[f32]) -> tender_embeddings::Result<f32> {
        match self {
            Self::Dot => dot_product(record, query),
            Self::Cosine => cosine_similarity(record, query),
        }
    }
}

/// A single ranked match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub record: TenderRecord,
    pub similarity_score: f32,
    pub financial_year: String,
}

/// Ranked matches for one query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    /// At most `top_k` matches, best first.
    pub results: Vec<SearchResult>,

    /// Number of records scoring at or above the threshold.
    pub total_matches: usize,
}

impl SearchOutcome {
    /// Matches above the threshold that were cut by `top_k`.
    pub fn hidden(&self) -> usize {
        self.total_matches.saturating_sub(self.results.len())
    }
}

/// Rank record vectors against a query vector.
///
/// Returns `(record index, score)` for every record scoring at least
/// `threshold`, best first. Equal scores keep record order. NaN scores
/// never match.
pub fn rank(
    vectors: &[Embedding],
    query: &[f32],
    threshold: f32,
    scoring: Scoring,
) -> tender_embeddings::Result<Vec<(usize, f32)>> {
    let mut matches = Vec::new();
    for (i, vector) in vectors.iter().enumerate() {
        let score = scoring.score(vector, query)?;
        if score >= threshold {
            matches.push((i, score));
        }
    }

    // Stable, so ties stay in record order.
    matches.sort_by_key(|&(_, score)| Reverse(OrderedFloat(score)));
    Ok(matches)
}

/// Search engine over one read-only partition.
pub struct SearchEngine {
    partition: Partition,
    provider: Arc<dyn EmbeddingProvider>,
    scoring: Scoring,
}

impl std::fmt::Debug for SearchEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchEngine")
            .field("partition", &self.partition)
            .field("scoring", &self.scoring)
            .finish_non_exhaustive()
    }
}

impl SearchEngine {
    /// Create an engine answering queries with `provider`.
    pub fn new(partition: Partition, provider: Arc<dyn EmbeddingProvider>) -> Self {
        let scoring = Scoring::select(partition.meta().normalized, provider.normalizes());
        if partition.meta().model != provider.model() {
            warn!(
                "Partition {} was built with model {} but queries use {}",
                partition.year(),
                partition.meta().model,
                provider.model()
            );
        }
        Self {
            partition,
            provider,
            scoring,
        }
    }

    pub fn partition(&self) -> &Partition {
        &self.partition
    }

    pub fn year(&self) -> &str {
        self.partition.year()
    }

    pub fn scoring(&self) -> Scoring {
        self.scoring
    }

    /// Find records similar to `query_text`.
    ///
    /// `total_matches` counts every record scoring `>= threshold`; only the
    /// best `top_k` of them are returned.
    pub async fn search(
        &self,
        query_text: &str,
        threshold: f32,
        top_k: usize,
    ) -> Result<SearchOutcome> {
        let query = self
            .provider
            .embed_one(query_text)
            .await
            .map_err(|e| SearchError::provider(format!("query embedding for {}", self.year()), e))?;

        self.search_vector(&query, threshold, top_k)
    }

    /// Rank against an already embedded query.
    pub fn search_vector(
        &self,
        query: &[f32],
        threshold: f32,
        top_k: usize,
    ) -> Result<SearchOutcome> {
        if query.len() != self.partition.dimension() {
            return Err(SearchError::DimensionMismatch {
                year: self.year().to_string(),
                expected: self.partition.dimension(),
                actual: query.len(),
            });
        }

        let matches = rank(self.partition.vectors(), query, threshold, self.scoring)
            .map_err(|e| SearchError::provider(format!("scoring {}", self.year()), e))?;
        let total_matches = matches.len();

        let records = self.partition.records();
        let results: Vec<SearchResult> = matches
            .into_iter()
            .take(top_k)
            .map(|(i, score)| SearchResult {
                record: records[i].clone(),
                similarity_score: score,
                financial_year: self.year().to_string(),
            })
            .collect();

        debug!(
            "Query on {} matched {total_matches} records (threshold {threshold}), returning {}",
            self.year(),
            results.len()
        );

        Ok(SearchOutcome {
            results,
            total_matches,
        })
    }
}
