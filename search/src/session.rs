//! The caller's active-partition handle.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;

use crate::builder::IndexBuilder;
use crate::engine::{SearchEngine, SearchOutcome};
use crate::error::{Result, SearchError};
use crate::partition::Partition;
use crate::record::TenderRecord;

/// Holds the search engine for the currently selected financial year.
///
/// Switching years builds or loads the new partition without holding the
/// lock, then swaps the engine in one write. Searches clone the engine
/// handle and release the lock before scoring, so a search that started on
/// the old partition finishes on it.
pub struct Session {
    builder: IndexBuilder,
    active: RwLock<Option<Arc<SearchEngine>>>,
}

impl Session {
    pub fn new(builder: IndexBuilder) -> Self {
        Self {
            builder,
            active: RwLock::new(None),
        }
    }

    pub fn builder(&self) -> &IndexBuilder {
        &self.builder
    }

    /// Load or build `year` and make it the active partition.
    pub async fn select_year<F, Fut, E>(
        &self,
        year: &str,
        force_rebuild: bool,
        fetch: F,
    ) -> std::result::Result<Arc<SearchEngine>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<Vec<TenderRecord>, E>>,
        E: From<SearchError>,
    {
        let partition = self
            .builder
            .load_or_build(year, force_rebuild, fetch)
            .await?;
        Ok(self.activate(partition).await)
    }

    /// Make `partition` the active one, dropping the previous engine once
    /// in-flight searches release it.
    pub async fn activate(&self, partition: Partition) -> Arc<SearchEngine> {
        let engine = Arc::new(SearchEngine::new(
            partition,
            Arc::clone(self.builder.provider()),
        ));

        let previous = self.active.write().await.replace(Arc::clone(&engine));
        match previous {
            Some(old) => info!("Switched financial year {} -> {}", old.year(), engine.year()),
            None => info!("Selected financial year {}", engine.year()),
        }
        engine
    }

    /// The active engine, if a year has been selected.
    pub async fn current(&self) -> Option<Arc<SearchEngine>> {
        self.active.read().await.clone()
    }

    /// The active financial year, if any.
    pub async fn active_year(&self) -> Option<String> {
        self.current().await.map(|e| e.year().to_string())
    }

    /// Search the active partition.
    pub async fn search(
        &self,
        query_text: &str,
        threshold: f32,
        top_k: usize,
    ) -> Result<SearchOutcome> {
        let engine = self.current().await.ok_or(SearchError::NoActivePartition)?;
        engine.search(query_text, threshold, top_k).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PartitionStore;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use tender_embeddings::HashingProvider;

    fn record(id: i64, year: &str, title: &str) -> TenderRecord {
        TenderRecord {
            id,
            title: title.to_string(),
            procurement_type: String::new(),
            entity: String::new(),
            sector: String::new(),
            financial_year: year.to_string(),
            deadline: String::new(),
            estimated_value: None,
        }
    }

    async fn session(dir: &TempDir) -> Session {
        let store = PartitionStore::new(dir.path()).await.unwrap();
        Session::new(IndexBuilder::new(Arc::new(HashingProvider::new(64)), store))
    }

    #[tokio::test]
    async fn test_search_without_year_fails() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir).await;

        let err = session.search("roads", 0.3, 5).await.unwrap_err();
        assert!(matches!(err, SearchError::NoActivePartition));
    }

    #[tokio::test]
    async fn test_switching_years_keeps_old_handles_valid() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir).await;
        let records = vec![
            record(1, "2023-2024", "bridge repair"),
            record(2, "2024-2025", "school desks"),
        ];
        let records = &records;
        let fetch = move || async move { Ok::<_, SearchError>(records.clone()) };

        let old = session.select_year("2023-2024", false, fetch).await.unwrap();
        session.select_year("2024-2025", false, fetch).await.unwrap();

        assert_eq!(session.active_year().await.as_deref(), Some("2024-2025"));
        let query = crate::compose::compose(&records[0]);
        let outcome = old.search(&query, 0.99, 5).await.unwrap();
        assert_eq!(outcome.results[0].record.id, 1);
        assert_eq!(outcome.results[0].financial_year, "2023-2024");
    }

    #[tokio::test]
    async fn test_failed_selection_keeps_previous_year() {
        let dir = TempDir::new().unwrap();
        let session = session(&dir).await;
        let records = vec![record(1, "2024-2025", "school desks")];
        let records = &records;
        let fetch = move || async move { Ok::<_, SearchError>(records.clone()) };

        session.select_year("2024-2025", false, fetch).await.unwrap();
        let err = session.select_year("1990-1991", false, fetch).await.unwrap_err();

        assert!(matches!(err, SearchError::EmptyPartition { .. }));
        assert_eq!(session.active_year().await.as_deref(), Some("2024-2025"));
    }
}
