//! Ranking, selection, and persistence behavior of the search core.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use tender_embeddings::{Embedding, EmbeddingError, EmbeddingProvider, HashingProvider};
use tender_search::{
    COMPOSER_VERSION, IndexBuilder, Partition, PartitionMeta, PartitionStore, SearchEngine,
    SearchError, TenderRecord,
};

/// Provider returning preset vectors for known texts.
struct FixedProvider {
    vectors: HashMap<String, Embedding>,
    dimension: usize,
}

impl FixedProvider {
    fn new(dimension: usize, entries: &[(&str, Embedding)]) -> Self {
        Self {
            vectors: entries
                .iter()
                .map(|(text, v)| ((*text).to_string(), v.clone()))
                .collect(),
            dimension,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FixedProvider {
    fn name(&self) -> &str {
        "fixed"
    }

    fn model(&self) -> &str {
        "fixed-v1"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn normalizes(&self) -> bool {
        true
    }

    async fn embed_one(&self, text: &str) -> tender_embeddings::Result<Embedding> {
        self.vectors
            .get(text)
            .cloned()
            .ok_or_else(|| EmbeddingError::ApiRequest(format!("unknown text: {text}")))
    }
}

fn record(id: i64, title: &str) -> TenderRecord {
    TenderRecord {
        id,
        title: title.to_string(),
        procurement_type: "Works".to_string(),
        entity: "Ministry of Works and Transport".to_string(),
        sector: "Roads".to_string(),
        financial_year: "2024-2025".to_string(),
        deadline: "2025-03-01".to_string(),
        estimated_value: Some(1_000_000.0 * id as f64),
    }
}

fn meta() -> PartitionMeta {
    PartitionMeta {
        provider: "fixed".to_string(),
        model: "fixed-v1".to_string(),
        normalized: true,
        composer_version: COMPOSER_VERSION,
    }
}

/// Three records scoring 0.9, 0.2 and 0.5 against the query "roads".
fn scenario_engine() -> SearchEngine {
    let unit = |x: f32| vec![x, (1.0 - x * x).sqrt(), 0.0];
    let partition = Partition::new(
        "2024-2025",
        vec![record(1, "high"), record(2, "low"), record(3, "mid")],
        vec![unit(0.9), unit(0.2), unit(0.5)],
        meta(),
    )
    .unwrap();
    let provider = FixedProvider::new(3, &[("roads", vec![1.0, 0.0, 0.0])]);
    SearchEngine::new(partition, Arc::new(provider))
}

fn ids(outcome: &tender_search::SearchOutcome) -> Vec<i64> {
    outcome.results.iter().map(|r| r.record.id).collect()
}

#[tokio::test]
async fn test_threshold_filters_and_orders_matches() {
    let engine = scenario_engine();
    let outcome = engine.search("roads", 0.3, 5).await.unwrap();

    assert_eq!(outcome.total_matches, 2);
    assert_eq!(ids(&outcome), vec![1, 3]);
    assert!((outcome.results[0].similarity_score - 0.9).abs() < 1e-6);
    assert!((outcome.results[1].similarity_score - 0.5).abs() < 1e-6);
    assert_eq!(outcome.results[0].financial_year, "2024-2025");
}

#[tokio::test]
async fn test_high_threshold_returns_nothing() {
    let engine = scenario_engine();
    let outcome = engine.search("roads", 0.95, 5).await.unwrap();

    assert_eq!(outcome.total_matches, 0);
    assert!(outcome.results.is_empty());
}

#[tokio::test]
async fn test_threshold_above_one_is_not_an_error() {
    let engine = scenario_engine();
    let outcome = engine.search("roads", 1.5, 5).await.unwrap();
    assert_eq!(outcome.total_matches, 0);
}

#[tokio::test]
async fn test_top_one_returns_best_and_counts_all() {
    let engine = scenario_engine();
    let outcome = engine.search("roads", 0.0, 1).await.unwrap();

    assert_eq!(outcome.total_matches, 3);
    assert_eq!(ids(&outcome), vec![1]);
    assert_eq!(outcome.hidden(), 2);
}

#[tokio::test]
async fn test_zero_top_k_still_counts_matches() {
    let engine = scenario_engine();
    let outcome = engine.search("roads", 0.3, 0).await.unwrap();

    assert!(outcome.results.is_empty());
    assert_eq!(outcome.total_matches, 2);
}

#[tokio::test]
async fn test_result_count_is_min_of_top_k_and_matches() {
    let engine = scenario_engine();
    for threshold in [-1.0, 0.0, 0.3, 0.6, 0.95] {
        for top_k in 0..6 {
            let outcome = engine.search("roads", threshold, top_k).await.unwrap();
            assert_eq!(
                outcome.results.len(),
                top_k.min(outcome.total_matches),
                "threshold {threshold}, top_k {top_k}"
            );
        }
    }
}

#[tokio::test]
async fn test_match_count_is_monotonic_in_threshold() {
    let engine = scenario_engine();
    let thresholds = [-1.0, 0.0, 0.1, 0.2, 0.3, 0.5, 0.7, 0.9, 0.95, 1.0];

    let mut previous = usize::MAX;
    for threshold in thresholds {
        let total = engine.search("roads", threshold, 10).await.unwrap().total_matches;
        assert!(total <= previous, "count rose at threshold {threshold}");
        previous = total;
    }
}

#[tokio::test]
async fn test_equal_scores_keep_record_order() {
    let partition = Partition::new(
        "2024-2025",
        vec![record(1, "a"), record(2, "b"), record(3, "c"), record(4, "d")],
        vec![
            vec![0.6, 0.8],
            vec![1.0, 0.0],
            vec![0.6, 0.8],
            vec![0.6, 0.8],
        ],
        meta(),
    )
    .unwrap();
    let provider = FixedProvider::new(2, &[("q", vec![1.0, 0.0])]);
    let engine = SearchEngine::new(partition, Arc::new(provider));

    let outcome = engine.search("q", 0.0, 10).await.unwrap();
    assert_eq!(ids(&outcome), vec![2, 1, 3, 4]);

    let scores: Vec<f32> = outcome.results.iter().map(|r| r.similarity_score).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
}

#[tokio::test]
async fn test_query_dimension_mismatch_is_fatal() {
    let partition = scenario_engine().partition().clone();
    let provider = FixedProvider::new(2, &[("roads", vec![1.0, 0.0])]);
    let engine = SearchEngine::new(partition, Arc::new(provider));

    let err = engine.search("roads", 0.3, 5).await.unwrap_err();
    assert!(matches!(
        err,
        SearchError::DimensionMismatch {
            expected: 3,
            actual: 2,
            ..
        }
    ));
}

#[tokio::test]
async fn test_provider_failure_is_propagated() {
    let engine = scenario_engine();
    let err = engine.search("not known", 0.3, 5).await.unwrap_err();
    assert!(matches!(err, SearchError::Provider { .. }));
}

#[tokio::test]
async fn test_built_partition_round_trips_through_store() {
    let dir = TempDir::new().unwrap();
    let store = PartitionStore::new(dir.path()).await.unwrap();
    let builder = IndexBuilder::new(Arc::new(HashingProvider::new(48)), store.clone());

    let mut records = vec![record(1, "Upgrade of Kampala roads"), record(2, "Supply of desks")];
    records.push(TenderRecord {
        financial_year: "2023-2024".to_string(),
        ..record(3, "Old tender")
    });
    records[1].estimated_value = None;
    records[1].deadline = "not a date".to_string();

    let built = builder.build(&records, "2024-2025").await.unwrap();
    assert_eq!(built.records().len(), built.vectors().len());
    assert_eq!(built.len(), 2);

    let loaded = store.load("2024-2025").await.unwrap();
    assert_eq!(loaded, built);
}

#[tokio::test]
async fn test_mismatched_counts_on_disk_are_corrupt() {
    let dir = TempDir::new().unwrap();
    let store = PartitionStore::new(dir.path()).await.unwrap();
    let builder = IndexBuilder::new(Arc::new(HashingProvider::new(8)), store.clone());
    builder
        .build(&[record(1, "a"), record(2, "b")], "2024-2025")
        .await
        .unwrap();

    // Record count lives at bytes 12..20 of the vector file.
    let path = store.vectors_path("2024-2025");
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[12..20].copy_from_slice(&3u64.to_le_bytes());
    std::fs::write(&path, bytes).unwrap();

    let err = store.load("2024-2025").await.unwrap_err();
    assert!(matches!(err, SearchError::CorruptPartition { .. }));
    assert!(err.is_recoverable_by_rebuild());

    let err = builder
        .load_or_build("2024-2025", false, || async {
            Ok::<_, SearchError>(Vec::new())
        })
        .await
        .unwrap_err();
    assert!(matches!(err, SearchError::CorruptPartition { .. }));
}

#[tokio::test]
async fn test_half_replaced_pair_is_not_loadable() {
    let dir = TempDir::new().unwrap();
    let store = PartitionStore::new(dir.path()).await.unwrap();
    let builder = IndexBuilder::new(Arc::new(HashingProvider::new(8)), store.clone());

    builder.build(&[record(1, "first")], "2024-2025").await.unwrap();
    let old_vectors = std::fs::read(store.vectors_path("2024-2025")).unwrap();

    builder
        .build(&[record(1, "first"), record(2, "second")], "2024-2025")
        .await
        .unwrap();

    // Simulate a crash after the CSV rename but before the vector rename.
    std::fs::write(store.vectors_path("2024-2025"), old_vectors).unwrap();

    let err = store.load("2024-2025").await.unwrap_err();
    assert!(matches!(err, SearchError::CorruptPartition { .. }));
}

#[tokio::test]
async fn test_stale_partition_is_rebuilt() {
    let dir = TempDir::new().unwrap();
    let store = PartitionStore::new(dir.path()).await.unwrap();
    let builder = IndexBuilder::new(Arc::new(HashingProvider::new(8)), store.clone());
    let records = vec![record(1, "a")];
    builder.build(&records, "2024-2025").await.unwrap();

    let path = store.vectors_path("2024-2025");
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[8..12].copy_from_slice(&(COMPOSER_VERSION + 7).to_le_bytes());
    std::fs::write(&path, bytes).unwrap();

    let records = &records;
    let rebuilt = builder
        .load_or_build("2024-2025", false, move || async move {
            Ok::<_, SearchError>(records.clone())
        })
        .await
        .unwrap();

    assert_eq!(rebuilt.meta().composer_version, COMPOSER_VERSION);
    assert_eq!(store.load("2024-2025").await.unwrap(), rebuilt);
}
